use hvac_common::{ActuatorState, SensorModel, TemperatureSensor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("refresh failed on {0}")]
    RefreshFailed(String),
    #[error("reading {0} outside the valid range")]
    OutOfRange(f32),
}

/// Room model that drifts toward an ambient temperature and responds to the
/// conditioning currently running.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temperature: f32,
    ambient: f32,
    drift_per_refresh: f32,
    conditioning_per_refresh: f32,
    load: f32,
}

impl SimulatedSensor {
    pub fn new(initial: f32, ambient: f32) -> Self {
        Self {
            temperature: initial,
            ambient,
            drift_per_refresh: 0.2,
            conditioning_per_refresh: 0.6,
            load: 0.0,
        }
    }

    /// Records what the actuators are doing so the next refresh reflects it.
    pub fn observe(&mut self, state: &ActuatorState) {
        self.load = if state.is_cooling_on() {
            -1.0
        } else if state.is_heating_compressor_on() || state.heating_element_on {
            1.0
        } else {
            0.0
        };
    }
}

impl TemperatureSensor for SimulatedSensor {
    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn info(&self) -> String {
        format!("simulated room (ambient {:.1})", self.ambient)
    }

    fn model(&self) -> SensorModel {
        SensorModel::Simulated
    }

    fn update_readings(&mut self) -> bool {
        let gap = self.ambient - self.temperature;
        let drift = gap.clamp(-self.drift_per_refresh, self.drift_per_refresh);
        self.temperature += drift + self.load * self.conditioning_per_refresh;
        true
    }
}
