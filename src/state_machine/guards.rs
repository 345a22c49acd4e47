use async_trait::async_trait;

use super::errors::{business_rule_violation, GuardResult};
use crate::models::Batch;
use crate::store::StateStore;

/// Trait for implementing state transition guards
#[async_trait]
pub trait StateGuard<T>: Send + Sync {
    /// Check if a transition is allowed
    async fn check(&self, entity: &T, store: &dyn StateStore) -> GuardResult<bool>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard to check that no unit of the batch is currently in flight.
///
/// Resuming while a worker still owns a unit would race a duplicate dispatch
/// of that unit, so the resume transition is rejected until the in-flight
/// unit records its own terminal state.
pub struct NoUnitsInFlightGuard;

#[async_trait]
impl StateGuard<Batch> for NoUnitsInFlightGuard {
    async fn check(&self, batch: &Batch, store: &dyn StateStore) -> GuardResult<bool> {
        let counts = store.unit_state_counts(batch.id).await?;

        if counts.any_in_flight() {
            return Err(business_rule_violation(format!(
                "Batch {} has {} unit(s) still processing",
                batch.id, counts.processing
            )));
        }

        Ok(true)
    }

    fn description(&self) -> &'static str {
        "No unit of the batch may be in flight"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;
    use crate::state_machine::events::UnitEvent;
    use crate::state_machine::states::UnitState;
    use crate::store::InMemoryStateStore;

    #[test]
    fn test_guard_description() {
        assert_eq!(
            NoUnitsInFlightGuard.description(),
            "No unit of the batch may be in flight"
        );
    }

    #[tokio::test]
    async fn test_guard_rejects_in_flight_units() {
        let store = InMemoryStateStore::new();
        let batch_id = uuid::Uuid::new_v4();
        let unit = Unit::new(batch_id, "sip.zip");
        let unit_id = unit.id;
        let mut batch = Batch::new(vec![unit_id], "/transfer", false);
        batch.id = batch_id;

        store
            .insert_batch_with_units(batch.clone(), vec![unit])
            .await
            .unwrap();

        assert!(NoUnitsInFlightGuard.check(&batch, &store).await.is_ok());

        store
            .transition_unit(unit_id, UnitState::New, &UnitEvent::Start, UnitState::Processing)
            .await
            .unwrap();
        assert!(NoUnitsInFlightGuard.check(&batch, &store).await.is_err());
    }
}
