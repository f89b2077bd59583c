//! Agent state machine with validated transitions.
//!
//! Initializing -> WaitingForInfo | Running
//! WaitingForInfo -> Running
//! Running -> WaitingForInfo | Completed
//! any non-terminal -> Cancelled | Error

use crate::error::AgentError;
use crate::types::AgentState;

/// Validate that a state transition is allowed.
///
/// Completed, Cancelled and Error are terminal: nothing leaves them.
pub fn validate_transition(from: AgentState, to: AgentState) -> Result<(), AgentError> {
    let valid = matches!(
        (from, to),
        (AgentState::Initializing, AgentState::WaitingForInfo)
            | (AgentState::Initializing, AgentState::Running)
            | (AgentState::WaitingForInfo, AgentState::Running)
            | (AgentState::Running, AgentState::WaitingForInfo)
            | (AgentState::Running, AgentState::Completed)
            | (AgentState::Initializing, AgentState::Cancelled)
            | (AgentState::WaitingForInfo, AgentState::Cancelled)
            | (AgentState::Running, AgentState::Cancelled)
            | (AgentState::Initializing, AgentState::Error)
            | (AgentState::WaitingForInfo, AgentState::Error)
            | (AgentState::Running, AgentState::Error)
    );

    if valid {
        Ok(())
    } else {
        Err(AgentError::InvalidTransition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [AgentState; 6] = [
        AgentState::Initializing,
        AgentState::WaitingForInfo,
        AgentState::Running,
        AgentState::Completed,
        AgentState::Cancelled,
        AgentState::Error,
    ];

    #[test]
    fn test_happy_path() {
        assert!(validate_transition(AgentState::Initializing, AgentState::WaitingForInfo).is_ok());
        assert!(validate_transition(AgentState::WaitingForInfo, AgentState::Running).is_ok());
        assert!(validate_transition(AgentState::Running, AgentState::Completed).is_ok());
    }

    #[test]
    fn test_direct_run_when_data_complete() {
        assert!(validate_transition(AgentState::Initializing, AgentState::Running).is_ok());
    }

    #[test]
    fn test_running_can_ask_for_more_info() {
        assert!(validate_transition(AgentState::Running, AgentState::WaitingForInfo).is_ok());
    }

    #[test]
    fn test_cancel_and_error_from_any_live_state() {
        for from in [
            AgentState::Initializing,
            AgentState::WaitingForInfo,
            AgentState::Running,
        ] {
            assert!(validate_transition(from, AgentState::Cancelled).is_ok());
            assert!(validate_transition(from, AgentState::Error).is_ok());
        }
    }

    #[test]
    fn test_waiting_cannot_complete_without_running() {
        assert!(validate_transition(AgentState::WaitingForInfo, AgentState::Completed).is_err());
        assert!(validate_transition(AgentState::Initializing, AgentState::Completed).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [AgentState::Completed, AgentState::Cancelled, AgentState::Error] {
            for to in ALL_STATES {
                assert!(
                    validate_transition(from, to).is_err(),
                    "{} -> {} must be rejected",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_self_transitions_invalid() {
        for state in ALL_STATES {
            assert!(validate_transition(state, state).is_err());
        }
    }

    #[test]
    fn test_all_valid_transitions_count() {
        let mut valid_count = 0;
        for from in ALL_STATES {
            for to in ALL_STATES {
                if validate_transition(from, to).is_ok() {
                    valid_count += 1;
                }
            }
        }
        assert_eq!(valid_count, 11, "Expected exactly 11 valid transitions");
    }

    #[test]
    fn test_error_message_names_both_states() {
        let err = validate_transition(AgentState::Error, AgentState::Running).unwrap_err();
        assert_eq!(err.to_string(), "Invalid state transition: ERROR -> RUNNING");
    }
}
