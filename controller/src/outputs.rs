use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use hvac_common::{
    DriverError, Level, OutputAction, OutputDriver, OutputLine, PinAssignment,
};
use tokio::sync::watch;
use tracing::{info, warn};

/// Executes controller plans against the injected driver, one step at a time.
pub struct OutputBus<D: OutputDriver> {
    driver: D,
    interrupt: watch::Receiver<bool>,
}

impl<D: OutputDriver> OutputBus<D> {
    pub fn new(driver: D, interrupt: watch::Receiver<bool>) -> Self {
        Self { driver, interrupt }
    }

    /// Returns the number of line writes that failed.
    pub async fn execute(&mut self, actions: Vec<OutputAction>) -> usize {
        let mut failures = 0;
        for action in actions {
            match action {
                OutputAction::Drive(line, level) => {
                    if let Err(err) = self.driver.drive(line, level) {
                        warn!("output write failed: {err}");
                        failures += 1;
                    }
                }
                OutputAction::Settle(delay_ms) => self.settle(delay_ms).await,
            }
        }
        failures
    }

    async fn settle(&mut self, delay_ms: u64) {
        let dwell = tokio::time::sleep(Duration::from_millis(delay_ms));
        tokio::select! {
            _ = dwell => {}
            Ok(()) = self.interrupt.changed() => {
                info!(delay_ms, "settle dwell interrupted, continuing");
            }
        }
    }

    /// Drives every line low and hands the driver back for disposal.
    pub fn release(mut self) -> Result<D, DriverError> {
        self.driver.fail_safe()?;
        Ok(self.driver)
    }
}

pub struct SimulatedOutputs {
    pins: PinAssignment,
    levels: HashMap<OutputLine, Level>,
}

impl SimulatedOutputs {
    pub fn new(pins: PinAssignment) -> Self {
        Self {
            pins,
            levels: HashMap::new(),
        }
    }

    pub fn level(&self, line: OutputLine) -> Level {
        self.levels.get(&line).copied().unwrap_or(Level::Low)
    }
}

impl OutputDriver for SimulatedOutputs {
    fn drive(&mut self, line: OutputLine, level: Level) -> Result<(), DriverError> {
        if self.levels.insert(line, level) != Some(level) {
            info!(
                line = line.as_str(),
                pin = self.pins.pin(line),
                "output -> {level:?}"
            );
        }
        Ok(())
    }
}

impl Drop for SimulatedOutputs {
    fn drop(&mut self) {
        let _ = self.fail_safe();
    }
}

/// Linux sysfs GPIO lines. Every line is exported as an output held low.
pub struct SysfsOutputs {
    root: PathBuf,
    pins: PinAssignment,
}

impl SysfsOutputs {
    pub fn open(root: impl AsRef<Path>, pins: PinAssignment) -> Result<Self, DriverError> {
        let outputs = Self {
            root: root.as_ref().to_path_buf(),
            pins,
        };

        for line in OutputLine::ALL {
            let pin = outputs.pins.pin(line);
            let gpio_dir = outputs.root.join(format!("gpio{pin}"));
            if !gpio_dir.exists() {
                fs::write(outputs.root.join("export"), pin.to_string())
                    .map_err(|source| DriverError::Io { line, source })?;
            }
            fs::write(gpio_dir.join("direction"), "low")
                .map_err(|source| DriverError::Io { line, source })?;
        }

        Ok(outputs)
    }

    fn value_path(&self, line: OutputLine) -> PathBuf {
        self.root
            .join(format!("gpio{}", self.pins.pin(line)))
            .join("value")
    }
}

impl OutputDriver for SysfsOutputs {
    fn drive(&mut self, line: OutputLine, level: Level) -> Result<(), DriverError> {
        let value = match level {
            Level::High => "1",
            Level::Low => "0",
        };
        fs::write(self.value_path(line), value).map_err(|source| DriverError::Io { line, source })
    }
}

impl Drop for SysfsOutputs {
    fn drop(&mut self) {
        if let Err(err) = self.fail_safe() {
            warn!("failed to drive outputs low on release: {err}");
        }
    }
}
