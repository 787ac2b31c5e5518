use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::{
    config::{ClimateSetting, ControllerSetting},
    controller::HvacController,
    types::{Actuator, ClimateMode, CycleOutcome, FanMode, OutputAction, StatusReport},
};

/// Hysteresis verdict for one observed temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub hotter_than_max: bool,
    pub cooler_than_min: bool,
}

#[derive(Debug, Clone)]
pub struct ClimateManager {
    climate: ClimateSetting,
    controller: HvacController,
    last_outcome: CycleOutcome,
}

impl ClimateManager {
    pub fn new(climate: ClimateSetting, setting: ControllerSetting) -> Self {
        Self::with_controller(climate, HvacController::new(setting))
    }

    /// Takes over a controller in whatever state it is already in.
    pub fn with_controller(climate: ClimateSetting, controller: HvacController) -> Self {
        Self {
            climate,
            controller,
            last_outcome: CycleOutcome::Idle,
        }
    }

    pub fn climate(&self) -> &ClimateSetting {
        &self.climate
    }

    pub fn controller(&self) -> &HvacController {
        &self.controller
    }

    pub fn last_outcome(&self) -> CycleOutcome {
        self.last_outcome
    }

    pub fn update_observed_temperature(&mut self, temp: f32) {
        self.climate.observed_temperature = temp;
    }

    /// Replaces the band, keeping the latest observed temperature.
    pub fn update_climate_setting(&mut self, mut climate: ClimateSetting) {
        climate.observed_temperature = self.climate.observed_temperature;
        self.climate = climate;
    }

    pub fn update_controller_setting(&mut self, setting: ControllerSetting) {
        self.controller.set_setting(setting);
    }

    /// Classifies the observed temperature against the band. Running actuators
    /// hold until the reading passes the setpoint by the threshold on the far
    /// side; idle ones start only once it is a threshold beyond the near side.
    pub fn verdict(&self) -> Verdict {
        let ClimateSetting {
            temperature_max: max,
            temperature_min: min,
            temperature_threshold: threshold,
            observed_temperature: observed,
        } = self.climate;

        let hotter_than_max = if self.controller.is_cooling_on() {
            max < observed + threshold
        } else {
            max < observed - threshold
        };
        let cooler_than_min = if self.controller.is_heating_compressor_on() {
            min > observed - threshold
        } else {
            min > observed + threshold
        };

        Verdict {
            hotter_than_max,
            cooler_than_min,
        }
    }

    pub fn evaluate(&mut self, mode: ClimateMode, now_ms: u64) -> Vec<OutputAction> {
        let mut actions = Vec::new();
        self.last_outcome = self.evaluate_into(mode, now_ms, &mut actions);
        debug!(
            mode = mode.as_str(),
            observed = self.climate.observed_temperature,
            outcome = self.last_outcome.as_str(),
            "climate evaluated"
        );
        actions
    }

    fn evaluate_into(
        &mut self,
        mode: ClimateMode,
        now_ms: u64,
        actions: &mut Vec<OutputAction>,
    ) -> CycleOutcome {
        if self.controller.is_compressor_stuck(now_ms) {
            return CycleOutcome::Stuck;
        }

        if let Err(err) = self.climate.validate() {
            debug!("skipping cycle: {err}");
            return CycleOutcome::InvalidBand;
        }

        let Verdict {
            hotter_than_max,
            cooler_than_min,
        } = self.verdict();

        let hvac = &mut self.controller;
        match (hotter_than_max, cooler_than_min) {
            (true, true) => CycleOutcome::Contradictory,
            (false, false) => {
                hvac.set_heating_compressor(false, false, now_ms, actions);
                hvac.set_cooling(false, false, now_ms, actions);
                if hvac.setting().fan_mode == FanMode::Auto {
                    hvac.set_fan(false, false, now_ms, actions);
                }
                CycleOutcome::InRange
            }
            (true, false) if mode.allows_cooling() => {
                hvac.set_fan(true, true, now_ms, actions);
                if hvac.is_heating_compressor_on() {
                    hvac.set_heating_compressor(false, true, now_ms, actions);
                }
                if hvac.is_heating_element_on() {
                    hvac.set_heating_element(false, true, now_ms, actions);
                }
                hvac.set(Actuator::Cooling, true, false, now_ms, actions);
                CycleOutcome::Cooling
            }
            (false, true) if mode.allows_heating() => {
                hvac.set_fan(true, true, now_ms, actions);
                if hvac.is_cooling_on() {
                    hvac.set_cooling(false, true, now_ms, actions);
                }
                hvac.set(Actuator::HeatingCompressor, true, false, now_ms, actions);
                CycleOutcome::Heating
            }
            _ => CycleOutcome::Blocked,
        }
    }

    pub fn shutdown(&mut self, now_ms: u64) -> Vec<OutputAction> {
        self.last_outcome = CycleOutcome::Idle;
        self.controller.shutdown(now_ms)
    }

    pub fn status(&self, now_ms: u64) -> StatusReport {
        let hvac = &self.controller;
        let state = hvac.state();
        StatusReport {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            observed_temp: self.climate.observed_temperature,
            temperature_min: self.climate.temperature_min,
            temperature_max: self.climate.temperature_max,
            threshold: self.climate.temperature_threshold,
            fan_mode: hvac.setting().fan_mode.as_str(),
            outcome: self.last_outcome.as_str(),
            fan_on: state.fan_on,
            compressor: state.compressor.as_str(),
            heating_element_on: state.heating_element_on,
            compressor_stuck_remaining_ms: hvac.compressor_stuck_remaining_ms(now_ms),
            fan_recovery_remaining_ms: hvac.recovery_remaining_ms(Actuator::Fan, now_ms),
            compressor_recovery_remaining_ms: hvac
                .recovery_remaining_ms(Actuator::Cooling, now_ms),
            element_recovery_remaining_ms: hvac
                .recovery_remaining_ms(Actuator::HeatingElement, now_ms),
        }
    }
}
