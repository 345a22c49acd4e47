use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::UnitEvent,
    states::UnitState,
};
use crate::constants::events as lifecycle;
use crate::events::EventPublisher;
use crate::store::StateStore;

/// Unit state machine with compare-and-swap persistence.
///
/// Unit transitions are strictly linear (`New -> Processing -> terminal`).
/// The conditional update is what makes redelivered dispatch messages safe: a
/// duplicate `Start` against a unit that is no longer `New` resolves to an
/// invalid transition, which the worker turns into a dropped message.
pub struct UnitStateMachine {
    unit_id: Uuid,
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
}

impl UnitStateMachine {
    /// Create a new unit state machine instance
    pub fn new(unit_id: Uuid, store: Arc<dyn StateStore>, event_publisher: EventPublisher) -> Self {
        Self {
            unit_id,
            store,
            event_publisher,
        }
    }

    /// Get the current state of the unit
    pub async fn current_state(&self) -> StateMachineResult<UnitState> {
        let unit = self
            .store
            .unit(self.unit_id)
            .await?
            .ok_or_else(|| crate::store::StoreError::unit_not_found(self.unit_id))?;
        Ok(unit.state)
    }

    /// Attempt to transition the unit state
    pub async fn transition(&self, event: UnitEvent) -> StateMachineResult<UnitState> {
        let current_state = self.current_state().await?;
        let target_state = Self::determine_target_state(current_state, &event)?;

        let applied = self
            .store
            .transition_unit(self.unit_id, current_state, &event, target_state)
            .await?;
        if !applied {
            return Err(StateMachineError::Conflict {
                entity: "unit",
                id: self.unit_id,
                expected: current_state.to_string(),
            });
        }

        self.publish_transition(current_state, target_state, &event)
            .await;

        Ok(target_state)
    }

    /// Determine the target state based on current state and event.
    ///
    /// Pure function; terminal states absorb every event, keeping unit
    /// progression monotonic under redelivery.
    pub fn determine_target_state(
        current_state: UnitState,
        event: &UnitEvent,
    ) -> StateMachineResult<UnitState> {
        let target = match (current_state, event) {
            (UnitState::New, UnitEvent::Start) => UnitState::Processing,
            (UnitState::Processing, UnitEvent::Complete) => UnitState::Processed,
            (UnitState::Processing, UnitEvent::Fail(_)) => UnitState::Failed,

            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    async fn publish_transition(&self, from: UnitState, to: UnitState, event: &UnitEvent) {
        let event_name = match to {
            UnitState::Processing => lifecycle::UNIT_STARTED,
            UnitState::Processed => lifecycle::UNIT_PROCESSED,
            UnitState::Failed => lifecycle::UNIT_FAILED,
            UnitState::New => return,
        };
        let context = json!({
            "unit_id": self.unit_id,
            "from_state": from.to_string(),
            "to_state": to.to_string(),
            "error": event.error_message(),
        });
        if let Err(e) = self.event_publisher.publish(event_name, context).await {
            tracing::warn!(unit_id = %self.unit_id, error = %e, "Failed to publish unit transition event");
        }
    }

    /// Check if the unit is in a terminal state
    pub async fn is_terminal(&self) -> StateMachineResult<bool> {
        let current_state = self.current_state().await?;
        Ok(current_state.is_terminal())
    }

    /// Get unit ID
    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_progression() {
        assert_eq!(
            UnitStateMachine::determine_target_state(UnitState::New, &UnitEvent::Start).unwrap(),
            UnitState::Processing
        );
        assert_eq!(
            UnitStateMachine::determine_target_state(UnitState::Processing, &UnitEvent::Complete)
                .unwrap(),
            UnitState::Processed
        );
        assert_eq!(
            UnitStateMachine::determine_target_state(
                UnitState::Processing,
                &UnitEvent::fail_with_error("pipeline error")
            )
            .unwrap(),
            UnitState::Failed
        );
    }

    #[test]
    fn test_terminal_states_absorb() {
        for terminal in [UnitState::Processed, UnitState::Failed] {
            assert!(
                UnitStateMachine::determine_target_state(terminal, &UnitEvent::Start).is_err()
            );
            assert!(
                UnitStateMachine::determine_target_state(terminal, &UnitEvent::Complete).is_err()
            );
            assert!(UnitStateMachine::determine_target_state(
                terminal,
                &UnitEvent::fail_with_error("x")
            )
            .is_err());
        }
    }

    #[test]
    fn test_cannot_skip_processing() {
        assert!(
            UnitStateMachine::determine_target_state(UnitState::New, &UnitEvent::Complete).is_err()
        );
        assert!(UnitStateMachine::determine_target_state(
            UnitState::New,
            &UnitEvent::fail_with_error("x")
        )
        .is_err());
    }

    #[test]
    fn test_duplicate_start_rejected() {
        assert!(UnitStateMachine::determine_target_state(UnitState::Processing, &UnitEvent::Start)
            .is_err());
    }
}
