//! Reduction of child states into one parent state.

use jobweave_protocols::{ParentState, State, StateOperatorError};

/// Reduces the states of a parent's children to a single [`ParentState`].
///
/// Operators are compared by [`StateOperator::name`]; replacing an
/// aggregator's operator with one of the same name does nothing.
pub trait StateOperator: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, states: &[State]) -> Result<ParentState, StateOperatorError>;
}

/// The most severe child state wins. An empty list is `READY`.
///
/// Severity, lowest first: complete, ready, started, executing/active,
/// incomplete, exception. A mix of complete and ready children is ready,
/// so a parent only completes when every child has.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorstStateOp;

impl StateOperator for WorstStateOp {
    fn name(&self) -> &str {
        "worst"
    }

    fn evaluate(&self, states: &[State]) -> Result<ParentState, StateOperatorError> {
        worst(states.iter().map(|s| s.as_parent()))
    }
}

/// `ACTIVE` while any child is still running, otherwise worst-of.
///
/// Used by parents that run their children in parallel, where a failed
/// child should not hide siblings that are still going.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyActiveStateOp;

impl StateOperator for AnyActiveStateOp {
    fn name(&self) -> &str {
        "any-active"
    }

    fn evaluate(&self, states: &[State]) -> Result<ParentState, StateOperatorError> {
        check_destroyed(states)?;
        if states.iter().any(|s| s.is_stoppable() && !s.is_complete()) {
            return Ok(ParentState::Active);
        }
        WorstStateOp.evaluate(states)
    }
}

/// Treats `STARTED` children as finished, so a set of started services
/// reports `STARTED` rather than waiting for them to complete.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceManagerStateOp;

impl StateOperator for ServiceManagerStateOp {
    fn name(&self) -> &str {
        "service-manager"
    }

    fn evaluate(&self, states: &[State]) -> Result<ParentState, StateOperatorError> {
        let any_started = states.iter().any(|s| s.as_parent() == ParentState::Started);
        let result = worst(states.iter().map(|s| match s.as_parent() {
            ParentState::Started => ParentState::Complete,
            other => other,
        }))?;
        Ok(match result {
            ParentState::Complete if any_started => ParentState::Started,
            other => other,
        })
    }
}

fn check_destroyed(states: &[State]) -> Result<(), StateOperatorError> {
    match states.iter().position(|s| s.is_destroyed()) {
        Some(index) => Err(StateOperatorError::DestroyedChild { index }),
        None => Ok(()),
    }
}

fn worst(states: impl Iterator<Item = ParentState>) -> Result<ParentState, StateOperatorError> {
    let mut result: Option<ParentState> = None;
    for (index, state) in states.enumerate() {
        if state == ParentState::Destroyed {
            return Err(StateOperatorError::DestroyedChild { index });
        }
        result = match result {
            Some(current) if current.severity() >= state.severity() => Some(current),
            _ => Some(state),
        };
    }
    Ok(result.unwrap_or(ParentState::Ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobweave_protocols::JobState;

    fn jobs(states: &[JobState]) -> Vec<State> {
        states.iter().map(|s| (*s).into()).collect()
    }

    #[test]
    fn test_worst_empty_is_ready() {
        assert_eq!(WorstStateOp.evaluate(&[]).unwrap(), ParentState::Ready);
    }

    #[test]
    fn test_worst_all_complete() {
        let states = jobs(&[JobState::Complete, JobState::Complete]);
        assert_eq!(WorstStateOp.evaluate(&states).unwrap(), ParentState::Complete);
    }

    #[test]
    fn test_worst_ready_and_complete_is_ready() {
        let states = jobs(&[JobState::Complete, JobState::Ready]);
        assert_eq!(WorstStateOp.evaluate(&states).unwrap(), ParentState::Ready);
    }

    #[test]
    fn test_worst_precedence() {
        let states = jobs(&[JobState::Executing, JobState::Complete]);
        assert_eq!(WorstStateOp.evaluate(&states).unwrap(), ParentState::Active);

        let states = jobs(&[JobState::Executing, JobState::Incomplete]);
        assert_eq!(WorstStateOp.evaluate(&states).unwrap(), ParentState::Incomplete);

        let states = jobs(&[JobState::Incomplete, JobState::Exception, JobState::Ready]);
        assert_eq!(WorstStateOp.evaluate(&states).unwrap(), ParentState::Exception);
    }

    #[test]
    fn test_worst_order_insensitive() {
        let a = jobs(&[JobState::Ready, JobState::Incomplete, JobState::Complete]);
        let b = jobs(&[JobState::Complete, JobState::Ready, JobState::Incomplete]);
        assert_eq!(WorstStateOp.evaluate(&a).unwrap(), WorstStateOp.evaluate(&b).unwrap());
    }

    #[test]
    fn test_worst_destroyed_child_is_error() {
        let states = jobs(&[JobState::Complete, JobState::Destroyed]);
        assert_eq!(
            WorstStateOp.evaluate(&states),
            Err(StateOperatorError::DestroyedChild { index: 1 })
        );
    }

    #[test]
    fn test_any_active() {
        let states = vec![ParentState::Active.into(), JobState::Exception.into()];
        assert_eq!(AnyActiveStateOp.evaluate(&states).unwrap(), ParentState::Active);

        let states = jobs(&[JobState::Complete, JobState::Exception]);
        assert_eq!(AnyActiveStateOp.evaluate(&states).unwrap(), ParentState::Exception);
    }

    #[test]
    fn test_service_manager() {
        let states: Vec<State> = vec![ParentState::Started.into(), ParentState::Started.into()];
        assert_eq!(ServiceManagerStateOp.evaluate(&states).unwrap(), ParentState::Started);

        let states: Vec<State> = vec![ParentState::Started.into(), JobState::Complete.into()];
        assert_eq!(ServiceManagerStateOp.evaluate(&states).unwrap(), ParentState::Started);

        let states: Vec<State> = vec![ParentState::Started.into(), JobState::Exception.into()];
        assert_eq!(ServiceManagerStateOp.evaluate(&states).unwrap(), ParentState::Exception);
    }

    #[test]
    fn test_names_differ() {
        assert_ne!(WorstStateOp.name(), AnyActiveStateOp.name());
        assert_ne!(WorstStateOp.name(), ServiceManagerStateOp.name());
    }
}
