use serde::{Deserialize, Serialize};

/// Mode requested by the operator for an evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClimateMode {
    Heat,
    Cool,
    Fan,
    Auto,
}

impl ClimateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Fan => "FAN",
            Self::Auto => "AUTO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HEAT" => Some(Self::Heat),
            "COOL" => Some(Self::Cool),
            "FAN" => Some(Self::Fan),
            "AUTO" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn allows_cooling(self) -> bool {
        matches!(self, Self::Cool | Self::Auto)
    }

    pub fn allows_heating(self) -> bool {
        matches!(self, Self::Heat | Self::Auto)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FanMode {
    Auto,
    AlwaysOn,
}

impl FanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::AlwaysOn => "ALWAYS_ON",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actuator {
    Fan,
    Cooling,
    HeatingCompressor,
    HeatingElement,
}

impl Actuator {
    pub const ALL: [Actuator; 4] = [
        Actuator::Fan,
        Actuator::Cooling,
        Actuator::HeatingCompressor,
        Actuator::HeatingElement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fan => "FAN",
            Self::Cooling => "COOLING",
            Self::HeatingCompressor => "HEATING_COMPRESSOR",
            Self::HeatingElement => "HEATING_ELEMENT",
        }
    }
}

/// The single compressor relay, either idle or running in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressorState {
    #[default]
    Off,
    Cooling,
    Heating,
}

impl CompressorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Cooling => "COOLING",
            Self::Heating => "HEATING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputLine {
    Fan,
    Compressor,
    HeatingElement,
    CoolingDirection,
}

impl OutputLine {
    pub const ALL: [OutputLine; 4] = [
        OutputLine::Fan,
        OutputLine::Compressor,
        OutputLine::HeatingElement,
        OutputLine::CoolingDirection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fan => "FAN",
            Self::Compressor => "COMPRESSOR",
            Self::HeatingElement => "HEATING_ELEMENT",
            Self::CoolingDirection => "COOLING_DIRECTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn from_on(on: bool) -> Self {
        if on {
            Self::High
        } else {
            Self::Low
        }
    }
}

/// A step of the output plan produced by the controller, executed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Drive(OutputLine, Level),
    Settle(u64),
}

/// Result of evaluating one climate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleOutcome {
    Idle,
    Stuck,
    InvalidBand,
    Contradictory,
    InRange,
    Cooling,
    Heating,
    Blocked,
}

impl CycleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Stuck => "STUCK",
            Self::InvalidBand => "INVALID_BAND",
            Self::Contradictory => "CONTRADICTORY",
            Self::InRange => "IN_RANGE",
            Self::Cooling => "COOLING",
            Self::Heating => "HEATING",
            Self::Blocked => "BLOCKED",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    #[serde(rename = "observedTemp")]
    pub observed_temp: f32,
    #[serde(rename = "temperatureMin")]
    pub temperature_min: f32,
    #[serde(rename = "temperatureMax")]
    pub temperature_max: f32,
    pub threshold: f32,
    #[serde(rename = "fanMode")]
    pub fan_mode: &'static str,
    pub outcome: &'static str,
    #[serde(rename = "fanOn")]
    pub fan_on: bool,
    pub compressor: &'static str,
    #[serde(rename = "heatingElementOn")]
    pub heating_element_on: bool,
    #[serde(rename = "compressorStuckRemainingMs")]
    pub compressor_stuck_remaining_ms: u64,
    #[serde(rename = "fanRecoveryRemainingMs")]
    pub fan_recovery_remaining_ms: u64,
    #[serde(rename = "compressorRecoveryRemainingMs")]
    pub compressor_recovery_remaining_ms: u64,
    #[serde(rename = "elementRecoveryRemainingMs")]
    pub element_recovery_remaining_ms: u64,
}
