use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    types::{Actuator, ClimateMode, FanMode, OutputLine},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateSetting {
    pub temperature_max: f32,
    pub temperature_min: f32,
    pub temperature_threshold: f32,
    #[serde(skip)]
    pub observed_temperature: f32,
}

impl Default for ClimateSetting {
    fn default() -> Self {
        Self {
            temperature_max: 75.0,
            temperature_min: 65.0,
            temperature_threshold: 2.0,
            observed_temperature: 70.0,
        }
    }
}

impl ClimateSetting {
    pub fn new(temperature_max: f32, temperature_min: f32, temperature_threshold: f32) -> Self {
        Self {
            temperature_max,
            temperature_min,
            temperature_threshold,
            ..Self::default()
        }
    }

    /// The band must be non-empty and wide enough to hold both deadbands.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let band = self.temperature_max - self.temperature_min;
        if self.temperature_max <= self.temperature_min
            || band < self.temperature_threshold * 2.0
        {
            return Err(ConfigError::InvalidBand {
                max: self.temperature_max,
                min: self.temperature_min,
                threshold: self.temperature_threshold,
            });
        }
        Ok(())
    }

    pub fn sanitize(&mut self) {
        if !self.temperature_threshold.is_finite() || self.temperature_threshold < 0.0 {
            self.temperature_threshold = 0.0;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinAssignment {
    pub fan: u32,
    pub compressor: u32,
    pub heating_element: u32,
    pub cooling_direction: u32,
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            fan: 17,
            compressor: 27,
            heating_element: 22,
            cooling_direction: 23,
        }
    }
}

impl PinAssignment {
    pub fn pin(&self, line: OutputLine) -> u32 {
        match line {
            OutputLine::Fan => self.fan,
            OutputLine::Compressor => self.compressor,
            OutputLine::HeatingElement => self.heating_element,
            OutputLine::CoolingDirection => self.cooling_direction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSetting {
    pub fan_recovery_ms: u64,
    pub compressor_recovery_ms: u64,
    /// Falls back to the compressor recovery window when unset.
    pub element_recovery_ms: Option<u64>,
    pub compressor_stick_ms: u64,
    pub toggle_delay_ms: u64,
    pub fan_mode: FanMode,
    pub pins: PinAssignment,
}

impl Default for ControllerSetting {
    fn default() -> Self {
        Self {
            fan_recovery_ms: 30_000,
            compressor_recovery_ms: 300_000,
            element_recovery_ms: None,
            compressor_stick_ms: 300_000,
            toggle_delay_ms: 1_000,
            fan_mode: FanMode::Auto,
            pins: PinAssignment::default(),
        }
    }
}

impl ControllerSetting {
    pub fn recovery_ms(&self, actuator: Actuator) -> u64 {
        match actuator {
            Actuator::Fan => self.fan_recovery_ms,
            Actuator::Cooling | Actuator::HeatingCompressor => self.compressor_recovery_ms,
            Actuator::HeatingElement => self
                .element_recovery_ms
                .unwrap_or(self.compressor_recovery_ms),
        }
    }

    pub fn sanitize(&mut self) {
        self.toggle_delay_ms = self.toggle_delay_ms.min(10_000);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Simulated,
    Sysfs,
}

impl DriverKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" => Some(Self::Simulated),
            "sysfs" => Some(Self::Sysfs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub cycle_interval_ms: u64,
    pub mode: ClimateMode,
    pub driver: DriverKind,
    pub min_valid_temp: f32,
    pub max_valid_temp: f32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 5_000,
            mode: ClimateMode::Auto,
            driver: DriverKind::Simulated,
            min_valid_temp: -40.0,
            max_valid_temp: 150.0,
        }
    }
}

impl HostConfig {
    pub fn sanitize(&mut self) {
        self.cycle_interval_ms = self.cycle_interval_ms.clamp(1_000, 600_000);
    }

    pub fn is_valid_reading(&self, temp: f32) -> bool {
        temp.is_finite() && (self.min_valid_temp..=self.max_valid_temp).contains(&temp)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub climate: ClimateSetting,
    pub controller: ControllerSetting,
    #[serde(default)]
    pub host: HostConfig,
}

impl RuntimeConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: RuntimeConfig = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        self.climate.sanitize();
        self.controller.sanitize();
        self.host.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_band_is_valid() {
        assert!(ClimateSetting::default().validate().is_ok());
    }

    #[test]
    fn band_narrower_than_two_thresholds_is_rejected() {
        let setting = ClimateSetting::new(70.0, 67.0, 2.0);
        assert!(matches!(
            setting.validate(),
            Err(ConfigError::InvalidBand { .. })
        ));

        let inverted = ClimateSetting::new(60.0, 70.0, 1.0);
        assert!(inverted.validate().is_err());

        let exact = ClimateSetting::new(71.0, 67.0, 2.0);
        assert!(exact.validate().is_ok());
    }

    #[test]
    fn element_recovery_falls_back_to_compressor() {
        let mut setting = ControllerSetting::default();
        assert_eq!(
            setting.recovery_ms(Actuator::HeatingElement),
            setting.compressor_recovery_ms
        );

        setting.element_recovery_ms = Some(42);
        assert_eq!(setting.recovery_ms(Actuator::HeatingElement), 42);
        assert_eq!(setting.recovery_ms(Actuator::Fan), setting.fan_recovery_ms);
    }

    #[test]
    fn runtime_config_fills_optional_sections() {
        let raw = br#"{
            "climate": {"temperature_max": 78.0, "temperature_min": 66.0, "temperature_threshold": 1.5},
            "controller": {
                "fan_recovery_ms": 1000,
                "compressor_recovery_ms": 2000,
                "compressor_stick_ms": 3000,
                "toggle_delay_ms": 60000,
                "fan_mode": "ALWAYS_ON"
            }
        }"#;

        let config = RuntimeConfig::from_json(raw).unwrap();

        assert_eq!(config.climate.temperature_max, 78.0);
        assert_eq!(config.controller.fan_mode, FanMode::AlwaysOn);
        assert_eq!(config.controller.element_recovery_ms, None);
        assert_eq!(config.controller.toggle_delay_ms, 10_000);
        assert_eq!(config.controller.pins, PinAssignment::default());
        assert_eq!(config.host.mode, ClimateMode::Auto);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = br#"{
            "climate": {"temperature_max": 80.0},
            "controller": {"fan_mode": "ALWAYS_ON"},
            "host": {"mode": "COOL"}
        }"#;

        let config = RuntimeConfig::from_json(raw).unwrap();

        assert_eq!(config.climate.temperature_max, 80.0);
        assert_eq!(config.climate.temperature_min, 65.0);
        assert_eq!(config.climate.observed_temperature, 70.0);
        assert_eq!(config.controller.fan_mode, FanMode::AlwaysOn);
        assert_eq!(config.controller.compressor_recovery_ms, 300_000);
        assert_eq!(config.controller.toggle_delay_ms, 1_000);
        assert_eq!(config.host.mode, ClimateMode::Cool);
        assert_eq!(config.host.cycle_interval_ms, 5_000);
        assert_eq!(config.host.driver, DriverKind::Simulated);
    }

    #[test]
    fn malformed_runtime_config_is_a_parse_error() {
        assert!(matches!(
            RuntimeConfig::from_json(b"{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
