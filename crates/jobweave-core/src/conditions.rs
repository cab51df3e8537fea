//! Conditions under which a guarded action may run.

use jobweave_protocols::State;

/// A predicate over the current state, checked while the transition guard
/// is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCondition {
    /// Always satisfied.
    Any,
    /// Ready to run.
    Executable,
    NotExecuting,
    Stoppable,
    SoftResetable,
    HardResetable,
    /// Running in the background: stoppable but no longer executing.
    Started,
    /// Finished and not running.
    Finished,
}

impl StateCondition {
    pub fn test(self, state: State) -> bool {
        match self {
            StateCondition::Any => true,
            StateCondition::Executable => state.is_ready(),
            StateCondition::NotExecuting => !state.is_executing(),
            StateCondition::Stoppable => state.is_stoppable(),
            StateCondition::SoftResetable | StateCondition::HardResetable => {
                !state.is_stoppable() && !state.is_destroyed()
            }
            StateCondition::Started => state.is_stoppable() && !state.is_executing(),
            StateCondition::Finished => state.is_terminal(),
        }
    }
}
