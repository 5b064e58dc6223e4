use notepin_shared::Mode;

use crate::error::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub mode: Mode,
    pub previous_mode: Mode,
}

/// `view` / `annotate` state. Only `annotate` captures overlay clicks.
#[derive(Debug, Default)]
pub struct ModeMachine {
    mode: Mode,
    read_only: bool,
}

impl ModeMachine {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn captures_clicks(&self) -> bool {
        self.mode == Mode::Annotate
    }

    pub fn transition(&mut self, target: Mode) -> Result<Transition, EngineError> {
        if target == Mode::Annotate && self.read_only {
            return Err(EngineError::ReadOnly);
        }
        let previous_mode = self.mode;
        self.mode = target;
        Ok(Transition {
            mode: target,
            previous_mode,
        })
    }

    /// Applies a mount's read-only flag. Returns the forced transition back to `view`
    /// when the machine was annotating.
    pub fn set_read_only(&mut self, read_only: bool) -> Option<Transition> {
        self.read_only = read_only;
        if read_only && self.mode == Mode::Annotate {
            self.mode = Mode::View;
            return Some(Transition {
                mode: Mode::View,
                previous_mode: Mode::Annotate,
            });
        }
        None
    }
}
