use tracing::{debug, info};

use crate::{
    config::ControllerSetting,
    error::Refusal,
    types::{Actuator, CompressorState, Level, OutputAction, OutputLine},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub last_enable_ms: Option<u64>,
    pub last_disable_ms: Option<u64>,
}

/// Authoritative actuator state. Only [`HvacController`] mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActuatorState {
    pub fan_on: bool,
    pub compressor: CompressorState,
    pub heating_element_on: bool,
    pub fan: Timestamps,
    // Cooling and heating share the compressor relay and therefore one clock.
    pub compressor_clock: Timestamps,
    pub element: Timestamps,
}

impl ActuatorState {
    pub fn is_cooling_on(&self) -> bool {
        self.compressor == CompressorState::Cooling
    }

    pub fn is_heating_compressor_on(&self) -> bool {
        self.compressor == CompressorState::Heating
    }

    pub fn is_on(&self, actuator: Actuator) -> bool {
        match actuator {
            Actuator::Fan => self.fan_on,
            Actuator::Cooling => self.is_cooling_on(),
            Actuator::HeatingCompressor => self.is_heating_compressor_on(),
            Actuator::HeatingElement => self.heating_element_on,
        }
    }

    pub fn timestamps(&self, actuator: Actuator) -> Timestamps {
        match actuator {
            Actuator::Fan => self.fan,
            Actuator::Cooling | Actuator::HeatingCompressor => self.compressor_clock,
            Actuator::HeatingElement => self.element,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Unchanged,
    Refused(Refusal),
}

#[derive(Debug, Clone)]
pub struct HvacController {
    setting: ControllerSetting,
    state: ActuatorState,
    // Earliest instant the next command may reach the outputs.
    ready_at_ms: u64,
}

impl HvacController {
    pub fn new(setting: ControllerSetting) -> Self {
        Self {
            setting,
            state: ActuatorState::default(),
            ready_at_ms: 0,
        }
    }

    pub fn setting(&self) -> &ControllerSetting {
        &self.setting
    }

    pub fn set_setting(&mut self, setting: ControllerSetting) {
        self.setting = setting;
    }

    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    pub fn is_fan_on(&self) -> bool {
        self.state.fan_on
    }

    pub fn is_cooling_on(&self) -> bool {
        self.state.is_cooling_on()
    }

    pub fn is_heating_compressor_on(&self) -> bool {
        self.state.is_heating_compressor_on()
    }

    pub fn is_heating_element_on(&self) -> bool {
        self.state.heating_element_on
    }

    pub fn ready_at_ms(&self) -> u64 {
        self.ready_at_ms
    }

    pub fn is_compressor_stuck(&self, now_ms: u64) -> bool {
        self.compressor_stuck_remaining_ms(now_ms) > 0
    }

    pub fn compressor_stuck_remaining_ms(&self, now_ms: u64) -> u64 {
        self.state
            .compressor_clock
            .last_enable_ms
            .map(|enabled| {
                enabled
                    .saturating_add(self.setting.compressor_stick_ms)
                    .saturating_sub(now_ms)
            })
            .unwrap_or(0)
    }

    pub fn recovery_remaining_ms(&self, actuator: Actuator, now_ms: u64) -> u64 {
        self.state
            .timestamps(actuator)
            .last_disable_ms
            .map(|disabled| {
                disabled
                    .saturating_add(self.setting.recovery_ms(actuator))
                    .saturating_sub(now_ms)
            })
            .unwrap_or(0)
    }

    pub fn set(
        &mut self,
        actuator: Actuator,
        on: bool,
        force: bool,
        now_ms: u64,
        actions: &mut Vec<OutputAction>,
    ) -> Transition {
        match actuator {
            Actuator::Fan => self.set_fan(on, force, now_ms, actions),
            Actuator::Cooling => self.set_cooling(on, force, now_ms, actions),
            Actuator::HeatingCompressor => {
                self.set_heating_compressor(on, force, now_ms, actions)
            }
            Actuator::HeatingElement => self.set_heating_element(on, force, now_ms, actions),
        }
    }

    pub fn set_fan(
        &mut self,
        on: bool,
        force: bool,
        now_ms: u64,
        actions: &mut Vec<OutputAction>,
    ) -> Transition {
        if !force && on == self.state.fan_on {
            return Transition::Unchanged;
        }

        if on {
            let at = self.command_time(now_ms);
            if let Err(refusal) = self.check_recovery(Actuator::Fan, at) {
                return Self::refuse(Actuator::Fan, refusal);
            }

            actions.push(OutputAction::Drive(OutputLine::Fan, Level::High));
            self.state.fan_on = true;
            self.state.fan.last_enable_ms = Some(at);
            info!(at_ms = at, "fan enabled");
            self.settle(at, actions);
        } else {
            // Nothing may run without airflow.
            if self.state.is_cooling_on() {
                self.set_cooling(false, true, now_ms, actions);
            }
            if self.state.is_heating_compressor_on() {
                self.set_heating_compressor(false, true, now_ms, actions);
            }
            if self.state.heating_element_on {
                self.set_heating_element(false, true, now_ms, actions);
            }

            let at = self.command_time(now_ms);
            actions.push(OutputAction::Drive(OutputLine::Fan, Level::Low));
            if self.state.fan_on {
                self.state.fan.last_disable_ms = Some(at);
            }
            self.state.fan_on = false;
            info!(at_ms = at, "fan disabled");
            self.settle(at, actions);
        }

        Transition::Applied
    }

    pub fn set_cooling(
        &mut self,
        on: bool,
        force: bool,
        now_ms: u64,
        actions: &mut Vec<OutputAction>,
    ) -> Transition {
        if !force && on == self.state.is_cooling_on() {
            return Transition::Unchanged;
        }

        let at = self.command_time(now_ms);
        if on {
            if let Err(refusal) = self.check_enable(Actuator::Cooling, at) {
                return Self::refuse(Actuator::Cooling, refusal);
            }

            actions.push(OutputAction::Drive(OutputLine::CoolingDirection, Level::High));
            actions.push(OutputAction::Drive(OutputLine::Compressor, Level::High));
            self.state.compressor = CompressorState::Cooling;
            self.state.compressor_clock.last_enable_ms = Some(at);
            info!(at_ms = at, "cooling enabled");
        } else {
            match self.state.compressor {
                // The relay is running for heat; this direction is already off.
                CompressorState::Heating => return Transition::Unchanged,
                CompressorState::Cooling => {
                    self.state.compressor_clock.last_disable_ms = Some(at);
                }
                CompressorState::Off => {}
            }

            actions.push(OutputAction::Drive(OutputLine::Compressor, Level::Low));
            actions.push(OutputAction::Drive(OutputLine::CoolingDirection, Level::Low));
            self.state.compressor = CompressorState::Off;
            info!(at_ms = at, "cooling disabled");
        }

        self.settle(at, actions);
        Transition::Applied
    }

    pub fn set_heating_compressor(
        &mut self,
        on: bool,
        force: bool,
        now_ms: u64,
        actions: &mut Vec<OutputAction>,
    ) -> Transition {
        if !force && on == self.state.is_heating_compressor_on() {
            return Transition::Unchanged;
        }

        let at = self.command_time(now_ms);
        if on {
            if let Err(refusal) = self.check_enable(Actuator::HeatingCompressor, at) {
                return Self::refuse(Actuator::HeatingCompressor, refusal);
            }

            actions.push(OutputAction::Drive(OutputLine::CoolingDirection, Level::Low));
            actions.push(OutputAction::Drive(OutputLine::Compressor, Level::High));
            self.state.compressor = CompressorState::Heating;
            self.state.compressor_clock.last_enable_ms = Some(at);
            info!(at_ms = at, "heating compressor enabled");
        } else {
            match self.state.compressor {
                CompressorState::Cooling => return Transition::Unchanged,
                CompressorState::Heating => {
                    self.state.compressor_clock.last_disable_ms = Some(at);
                }
                CompressorState::Off => {}
            }

            actions.push(OutputAction::Drive(OutputLine::Compressor, Level::Low));
            self.state.compressor = CompressorState::Off;
            info!(at_ms = at, "heating compressor disabled");
        }

        self.settle(at, actions);
        Transition::Applied
    }

    pub fn set_heating_element(
        &mut self,
        on: bool,
        force: bool,
        now_ms: u64,
        actions: &mut Vec<OutputAction>,
    ) -> Transition {
        if !force && on == self.state.heating_element_on {
            return Transition::Unchanged;
        }

        let at = self.command_time(now_ms);
        if on {
            if let Err(refusal) = self.check_enable(Actuator::HeatingElement, at) {
                return Self::refuse(Actuator::HeatingElement, refusal);
            }

            actions.push(OutputAction::Drive(OutputLine::HeatingElement, Level::High));
            self.state.heating_element_on = true;
            self.state.element.last_enable_ms = Some(at);
            info!(at_ms = at, "heating element enabled");
        } else {
            actions.push(OutputAction::Drive(OutputLine::HeatingElement, Level::Low));
            if self.state.heating_element_on {
                self.state.element.last_disable_ms = Some(at);
            }
            self.state.heating_element_on = false;
            info!(at_ms = at, "heating element disabled");
        }

        self.settle(at, actions);
        Transition::Applied
    }

    /// Forces every actuator off, dependents before the fan.
    pub fn shutdown(&mut self, now_ms: u64) -> Vec<OutputAction> {
        let mut actions = Vec::new();
        self.set_heating_compressor(false, true, now_ms, &mut actions);
        self.set_heating_element(false, true, now_ms, &mut actions);
        self.set_cooling(false, true, now_ms, &mut actions);
        self.set_fan(false, true, now_ms, &mut actions);
        actions
    }

    fn check_enable(&self, actuator: Actuator, at: u64) -> Result<(), Refusal> {
        if !self.state.fan_on {
            return Err(Refusal::FanOff);
        }

        let conflicts: &[Actuator] = match actuator {
            Actuator::Fan => &[],
            Actuator::Cooling => &[Actuator::HeatingCompressor, Actuator::HeatingElement],
            Actuator::HeatingCompressor => &[Actuator::Cooling, Actuator::HeatingElement],
            Actuator::HeatingElement => &[Actuator::Cooling, Actuator::HeatingCompressor],
        };
        if let Some(running) = conflicts.iter().find(|other| self.state.is_on(**other)) {
            return Err(Refusal::Conflict(*running));
        }

        self.check_recovery(actuator, at)
    }

    fn check_recovery(&self, actuator: Actuator, at: u64) -> Result<(), Refusal> {
        match self.recovery_remaining_ms(actuator, at) {
            0 => Ok(()),
            remaining_ms => Err(Refusal::Recovering {
                actuator,
                remaining_ms,
            }),
        }
    }

    fn refuse(actuator: Actuator, refusal: Refusal) -> Transition {
        debug!(actuator = actuator.as_str(), "enable refused: {refusal}");
        Transition::Refused(refusal)
    }

    fn command_time(&self, now_ms: u64) -> u64 {
        now_ms.max(self.ready_at_ms)
    }

    fn settle(&mut self, at: u64, actions: &mut Vec<OutputAction>) {
        let delay = self.setting.toggle_delay_ms;
        self.ready_at_ms = at.saturating_add(delay);
        if delay > 0 {
            actions.push(OutputAction::Settle(delay));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn controller() -> HvacController {
        HvacController::new(ControllerSetting {
            fan_recovery_ms: 1_000,
            compressor_recovery_ms: 5_000,
            element_recovery_ms: None,
            compressor_stick_ms: 10_000,
            toggle_delay_ms: 0,
            ..ControllerSetting::default()
        })
    }

    #[test]
    fn compressor_requires_fan() {
        let mut hvac = controller();
        let mut actions = Vec::new();

        let result = hvac.set_cooling(true, false, 0, &mut actions);

        assert_eq!(result, Transition::Refused(Refusal::FanOff));
        assert!(!hvac.is_cooling_on());
        assert!(actions.is_empty());
    }

    #[test]
    fn cooling_drives_direction_then_compressor() {
        let mut hvac = controller();
        let mut actions = Vec::new();

        hvac.set_fan(true, false, 0, &mut actions);
        actions.clear();
        let result = hvac.set_cooling(true, false, 100, &mut actions);

        assert_eq!(result, Transition::Applied);
        assert_eq!(
            actions,
            vec![
                OutputAction::Drive(OutputLine::CoolingDirection, Level::High),
                OutputAction::Drive(OutputLine::Compressor, Level::High),
            ]
        );
        assert_eq!(hvac.state().compressor_clock.last_enable_ms, Some(100));
    }

    #[test]
    fn cooling_refused_while_heating_compressor_runs() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_heating_compressor(true, false, 0, &mut actions);
        let before = hvac.state().clone();
        actions.clear();

        let result = hvac.set_cooling(true, false, 20_000, &mut actions);

        assert_eq!(
            result,
            Transition::Refused(Refusal::Conflict(Actuator::HeatingCompressor))
        );
        assert!(!hvac.is_cooling_on());
        assert_eq!(hvac.state(), &before);
        assert!(actions.is_empty());
    }

    #[test]
    fn element_refused_while_compressor_heats() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_heating_compressor(true, false, 0, &mut actions);

        let result = hvac.set_heating_element(true, false, 0, &mut actions);

        assert_eq!(
            result,
            Transition::Refused(Refusal::Conflict(Actuator::HeatingCompressor))
        );
        assert!(!hvac.is_heating_element_on());
    }

    #[test]
    fn unchanged_request_has_no_side_effects() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        let before = hvac.state().clone();
        actions.clear();

        for actuator in Actuator::ALL {
            let current = hvac.state().is_on(actuator);
            assert_eq!(
                hvac.set(actuator, current, false, 50, &mut actions),
                Transition::Unchanged
            );
        }

        assert_eq!(hvac.state(), &before);
        assert!(actions.is_empty());
    }

    #[test]
    fn compressor_recovery_blocks_restart_in_either_direction() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_cooling(true, false, 0, &mut actions);
        hvac.set_cooling(false, false, 12_000, &mut actions);

        let result = hvac.set_heating_compressor(true, false, 14_000, &mut actions);
        assert_eq!(
            result,
            Transition::Refused(Refusal::Recovering {
                actuator: Actuator::HeatingCompressor,
                remaining_ms: 3_000,
            })
        );

        let result = hvac.set_heating_compressor(true, false, 17_000, &mut actions);
        assert_eq!(result, Transition::Applied);
        assert!(hvac.is_heating_compressor_on());
    }

    #[test]
    fn element_uses_compressor_recovery_by_default() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_heating_element(true, false, 0, &mut actions);
        hvac.set_heating_element(false, false, 1_000, &mut actions);

        assert!(matches!(
            hvac.set_heating_element(true, false, 3_000, &mut actions),
            Transition::Refused(Refusal::Recovering { .. })
        ));
        assert_eq!(
            hvac.set_heating_element(true, false, 6_000, &mut actions),
            Transition::Applied
        );

        let mut setting = hvac.setting().clone();
        setting.element_recovery_ms = Some(500);
        hvac.set_setting(setting);
        hvac.set_heating_element(false, false, 7_000, &mut actions);
        assert_eq!(
            hvac.set_heating_element(true, false, 7_500, &mut actions),
            Transition::Applied
        );
    }

    #[test]
    fn fan_disable_cascades_to_dependents() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_cooling(true, false, 0, &mut actions);
        actions.clear();

        let result = hvac.set_fan(false, false, 2_000, &mut actions);

        assert_eq!(result, Transition::Applied);
        assert!(!hvac.is_fan_on());
        assert!(!hvac.is_cooling_on());
        assert_eq!(hvac.state().compressor_clock.last_disable_ms, Some(2_000));
        assert_eq!(hvac.state().fan.last_disable_ms, Some(2_000));
        assert_eq!(
            actions.last(),
            Some(&OutputAction::Drive(OutputLine::Fan, Level::Low))
        );
    }

    #[test]
    fn disabling_heating_leaves_cooling_relay_alone() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_cooling(true, false, 0, &mut actions);
        actions.clear();

        let result = hvac.set_heating_compressor(false, true, 100, &mut actions);

        assert_eq!(result, Transition::Unchanged);
        assert!(hvac.is_cooling_on());
        assert!(actions.is_empty());
    }

    #[test]
    fn forced_disable_of_idle_actuator_keeps_timestamps() {
        let mut hvac = controller();
        let mut actions = Vec::new();

        assert_eq!(
            hvac.set_heating_element(false, true, 500, &mut actions),
            Transition::Applied
        );
        assert_eq!(hvac.state().element, Timestamps::default());
        assert_eq!(
            actions,
            vec![OutputAction::Drive(OutputLine::HeatingElement, Level::Low)]
        );
    }

    #[test]
    fn settle_delay_spaces_out_commands() {
        let mut hvac = controller();
        let mut setting = hvac.setting().clone();
        setting.toggle_delay_ms = 1_000;
        hvac.set_setting(setting);
        let mut actions = Vec::new();

        hvac.set_fan(true, true, 10_000, &mut actions);
        hvac.set_cooling(true, false, 10_000, &mut actions);

        assert_eq!(hvac.state().fan.last_enable_ms, Some(10_000));
        assert_eq!(hvac.state().compressor_clock.last_enable_ms, Some(11_000));
        assert_eq!(hvac.ready_at_ms(), 12_000);
        assert_eq!(
            actions,
            vec![
                OutputAction::Drive(OutputLine::Fan, Level::High),
                OutputAction::Settle(1_000),
                OutputAction::Drive(OutputLine::CoolingDirection, Level::High),
                OutputAction::Drive(OutputLine::Compressor, Level::High),
                OutputAction::Settle(1_000),
            ]
        );
    }

    #[test]
    fn compressor_stick_window_follows_last_enable() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        assert!(!hvac.is_compressor_stuck(0));

        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_heating_compressor(true, false, 1_000, &mut actions);

        assert!(hvac.is_compressor_stuck(10_999));
        assert_eq!(hvac.compressor_stuck_remaining_ms(6_000), 5_000);
        assert!(!hvac.is_compressor_stuck(11_000));
    }

    #[test]
    fn shutdown_forces_everything_off() {
        let mut hvac = controller();
        let mut actions = Vec::new();
        hvac.set_fan(true, false, 0, &mut actions);
        hvac.set_heating_compressor(true, false, 0, &mut actions);

        let actions = hvac.shutdown(20_000);

        assert!(!hvac.is_fan_on());
        assert!(!hvac.is_heating_compressor_on());
        for line in OutputLine::ALL {
            assert!(
                actions.contains(&OutputAction::Drive(line, Level::Low)),
                "{} not driven low",
                line.as_str()
            );
        }
    }
}
