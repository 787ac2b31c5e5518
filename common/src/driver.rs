use crate::{
    error::DriverError,
    types::{Level, OutputAction, OutputLine},
};

/// Four independently addressable digital outputs.
pub trait OutputDriver {
    fn drive(&mut self, line: OutputLine, level: Level) -> Result<(), DriverError>;

    /// Drives every line low, reporting the first failure after trying all.
    fn fail_safe(&mut self) -> Result<(), DriverError> {
        let mut first_err = None;
        for line in OutputLine::ALL {
            if let Err(err) = self.drive(line, Level::Low) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<D: OutputDriver + ?Sized> OutputDriver for Box<D> {
    fn drive(&mut self, line: OutputLine, level: Level) -> Result<(), DriverError> {
        (**self).drive(line, level)
    }

    fn fail_safe(&mut self) -> Result<(), DriverError> {
        (**self).fail_safe()
    }
}

/// Folds a plan into the line levels it leaves behind.
pub fn final_levels(actions: &[OutputAction]) -> Vec<(OutputLine, Level)> {
    let mut levels: Vec<(OutputLine, Level)> = Vec::new();
    for action in actions {
        if let OutputAction::Drive(line, level) = *action {
            match levels.iter_mut().find(|(known, _)| *known == line) {
                Some(entry) => entry.1 = level,
                None => levels.push((line, level)),
            }
        }
    }
    levels
}
