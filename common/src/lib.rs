pub mod climate;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod sensor;
pub mod types;

pub use climate::{ClimateManager, Verdict};
pub use config::{
    ClimateSetting, ControllerSetting, DriverKind, HostConfig, PinAssignment, RuntimeConfig,
};
pub use controller::{ActuatorState, HvacController, Timestamps, Transition};
pub use driver::OutputDriver;
pub use error::{ConfigError, DriverError, Refusal};
pub use sensor::{SensorModel, TemperatureSensor};
pub use types::{
    Actuator, ClimateMode, CompressorState, CycleOutcome, FanMode, Level, OutputAction,
    OutputLine, StatusReport,
};
