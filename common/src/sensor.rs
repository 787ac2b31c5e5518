use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorModel {
    Ds18b20,
    Dht11,
    Simulated,
}

impl SensorModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ds18b20 => "DS18B20",
            Self::Dht11 => "DHT11",
            Self::Simulated => "SIMULATED",
        }
    }
}

/// A temperature source polled once per cycle.
pub trait TemperatureSensor {
    /// Latest reading from the last successful refresh.
    fn temperature(&self) -> f32;

    fn info(&self) -> String;

    fn model(&self) -> SensorModel;

    /// Refreshes the reading; `false` leaves the previous value in place.
    fn update_readings(&mut self) -> bool;
}
