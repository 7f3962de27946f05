//! Per-row state machine

/// Where a row is in its traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowState {
    Pending,
    Resolving,
    Skipped,
    Navigating,
    FillingForm,
    Recorded,
    FormError,
}

impl RowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RowState::Skipped | RowState::Recorded | RowState::FormError)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: RowState) -> bool {
        use RowState::*;
        matches!(
            (self, next),
            (Pending, Skipped)
                | (Pending, Resolving)
                | (Pending, Navigating)
                | (Resolving, Navigating)
                | (Resolving, FormError)
                | (Navigating, FillingForm)
                | (Navigating, FormError)
                | (FillingForm, Recorded)
                | (FillingForm, FormError)
        )
    }
}

impl std::fmt::Display for RowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RowState::Pending => "pending",
            RowState::Resolving => "resolving",
            RowState::Skipped => "skipped",
            RowState::Navigating => "navigating",
            RowState::FillingForm => "filling form",
            RowState::Recorded => "recorded",
            RowState::FormError => "form error",
        };
        f.write_str(name)
    }
}

/// Tracks one row's state and logs every transition
#[derive(Debug)]
pub(crate) struct RowMachine {
    line: usize,
    state: RowState,
}

impl RowMachine {
    pub(crate) fn new(line: usize) -> Self {
        Self {
            line,
            state: RowState::Pending,
        }
    }

    pub(crate) fn state(&self) -> RowState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: RowState) {
        if !self.state.can_transition_to(next) {
            log::error!("Row {}: illegal transition {} -> {}", self.line, self.state, next);
        }
        log::debug!("Row {}: {} -> {}", self.line, self.state, next);
        self.state = next;
    }
}
