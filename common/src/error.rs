use thiserror::Error;

use crate::types::{Actuator, OutputLine};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid temperature band: max {max} min {min} threshold {threshold}")]
    InvalidBand { max: f32, min: f32, threshold: f32 },
    #[error("failed to parse runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why a guarded enable request was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("fan is off")]
    FanOff,
    #[error("{} is on", .0.as_str())]
    Conflict(Actuator),
    #[error("{} recovering for another {remaining_ms} ms", .actuator.as_str())]
    Recovering { actuator: Actuator, remaining_ms: u64 },
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("output line {} is not available", .0.as_str())]
    Unavailable(OutputLine),
    #[error("failed to write output line {}: {source}", .line.as_str())]
    Io {
        line: OutputLine,
        #[source]
        source: std::io::Error,
    },
}
