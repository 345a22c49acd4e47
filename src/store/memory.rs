//! In-memory [`StateStore`] implementation.
//!
//! Backs the test suite and embedded deployments. A single `RwLock` over the
//! whole record map stands in for the transactional boundary a durable
//! implementation would get from its database: every mutation and every
//! cross-unit read happens under the lock, which makes `unit_state_counts` a
//! consistent snapshot and the transition methods true compare-and-swap.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{Batch, Unit};
use crate::state_machine::events::{BatchEvent, UnitEvent};
use crate::state_machine::states::{BatchState, UnitState};

use super::{StateStore, StoreError, StoreResult, TransitionRecord, UnitStateCounts};

#[derive(Default)]
struct Inner {
    batches: HashMap<Uuid, Batch>,
    units: HashMap<Uuid, Unit>,
    batch_history: HashMap<Uuid, Vec<TransitionRecord>>,
    unit_history: HashMap<Uuid, Vec<TransitionRecord>>,
}

/// In-memory state store with single-lock transactional semantics.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: RwLock<Inner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches currently stored. Test/diagnostic helper.
    pub fn batch_count(&self) -> usize {
        self.inner.read().batches.len()
    }
}

fn transition_record(
    from_state: String,
    to_state: String,
    event_type: &str,
    event: serde_json::Value,
) -> TransitionRecord {
    TransitionRecord {
        from_state,
        to_state,
        event_type: event_type.to_string(),
        event,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn insert_batch_with_units(&self, batch: Batch, units: Vec<Unit>) -> StoreResult<()> {
        let mut inner = self.inner.write();

        if inner.batches.contains_key(&batch.id) {
            return Err(StoreError::AlreadyExists {
                entity: "batch",
                id: batch.id,
            });
        }
        for unit in &units {
            if inner.units.contains_key(&unit.id) {
                return Err(StoreError::AlreadyExists {
                    entity: "unit",
                    id: unit.id,
                });
            }
        }

        for unit in units {
            inner.units.insert(unit.id, unit);
        }
        inner.batches.insert(batch.id, batch);
        Ok(())
    }

    async fn batch(&self, batch_id: Uuid) -> StoreResult<Option<Batch>> {
        Ok(self.inner.read().batches.get(&batch_id).cloned())
    }

    async fn unit(&self, unit_id: Uuid) -> StoreResult<Option<Unit>> {
        Ok(self.inner.read().units.get(&unit_id).cloned())
    }

    async fn units_of_batch(&self, batch_id: Uuid) -> StoreResult<Vec<Unit>> {
        let inner = self.inner.read();
        let batch = inner
            .batches
            .get(&batch_id)
            .ok_or_else(|| StoreError::batch_not_found(batch_id))?;

        // unit_ids carries discovery order; return units in that order
        batch
            .unit_ids
            .iter()
            .map(|unit_id| {
                inner
                    .units
                    .get(unit_id)
                    .cloned()
                    .ok_or_else(|| StoreError::unit_not_found(*unit_id))
            })
            .collect()
    }

    async fn unit_state_counts(&self, batch_id: Uuid) -> StoreResult<UnitStateCounts> {
        let inner = self.inner.read();
        let batch = inner
            .batches
            .get(&batch_id)
            .ok_or_else(|| StoreError::batch_not_found(batch_id))?;

        let mut counts = UnitStateCounts {
            total: batch.unit_ids.len(),
            new: 0,
            processing: 0,
            processed: 0,
            failed: 0,
        };
        for unit_id in &batch.unit_ids {
            let unit = inner
                .units
                .get(unit_id)
                .ok_or_else(|| StoreError::unit_not_found(*unit_id))?;
            match unit.state {
                UnitState::New => counts.new += 1,
                UnitState::Processing => counts.processing += 1,
                UnitState::Processed => counts.processed += 1,
                UnitState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn transition_batch(
        &self,
        batch_id: Uuid,
        expected: BatchState,
        event: &BatchEvent,
        to: BatchState,
    ) -> StoreResult<bool> {
        let event_json = serde_json::to_value(event)?;
        let mut inner = self.inner.write();

        let batch = inner
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| StoreError::batch_not_found(batch_id))?;

        if batch.state != expected {
            return Ok(false);
        }

        let from_state = batch.state.to_string();
        batch.state = to;
        batch.updated_at = Utc::now();
        if to == BatchState::Canceled {
            if let Some(reason) = event.cancellation_reason() {
                batch.cancellation_reason = Some(reason.to_string());
            }
        }

        let record =
            transition_record(from_state, to.to_string(), event.event_type(), event_json);
        inner.batch_history.entry(batch_id).or_default().push(record);
        Ok(true)
    }

    async fn transition_unit(
        &self,
        unit_id: Uuid,
        expected: UnitState,
        event: &UnitEvent,
        to: UnitState,
    ) -> StoreResult<bool> {
        let event_json = serde_json::to_value(event)?;
        let mut inner = self.inner.write();

        let unit = inner
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| StoreError::unit_not_found(unit_id))?;

        if unit.state != expected {
            return Ok(false);
        }

        let from_state = unit.state.to_string();
        unit.state = to;
        unit.updated_at = Utc::now();
        if let Some(error) = event.error_message() {
            unit.last_error = Some(error.to_string());
        }

        let record =
            transition_record(from_state, to.to_string(), event.event_type(), event_json);
        inner.unit_history.entry(unit_id).or_default().push(record);
        Ok(true)
    }

    async fn batch_transition_history(&self, batch_id: Uuid) -> StoreResult<Vec<TransitionRecord>> {
        Ok(self
            .inner
            .read()
            .batch_history
            .get(&batch_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn unit_transition_history(&self, unit_id: Uuid) -> StoreResult<Vec<TransitionRecord>> {
        Ok(self
            .inner
            .read()
            .unit_history
            .get(&unit_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> (InMemoryStateStore, Batch, Vec<Unit>) {
        let store = InMemoryStateStore::new();
        let batch_id = Uuid::new_v4();
        let units: Vec<Unit> = (0..3)
            .map(|i| Unit::new(batch_id, format!("sip_{i:04}.zip")))
            .collect();
        let mut batch = Batch::new(units.iter().map(|u| u.id).collect(), "/transfer", false);
        batch.id = batch_id;
        (store, batch, units)
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let (store, batch, units) = seed();
        let batch_id = batch.id;
        store
            .insert_batch_with_units(batch, units.clone())
            .await
            .unwrap();

        let stored = store.batch(batch_id).await.unwrap().unwrap();
        assert_eq!(stored.state, BatchState::Processing);

        let stored_units = store.units_of_batch(batch_id).await.unwrap();
        assert_eq!(stored_units.len(), 3);
        // Discovery order preserved
        let names: Vec<_> = stored_units
            .iter()
            .map(|u| u.original_file_name.clone())
            .collect();
        assert_eq!(names, vec!["sip_0000.zip", "sip_0001.zip", "sip_0002.zip"]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let (store, batch, units) = seed();
        store
            .insert_batch_with_units(batch.clone(), units.clone())
            .await
            .unwrap();
        let err = store
            .insert_batch_with_units(batch, units)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { entity: "batch", .. }));
    }

    #[tokio::test]
    async fn test_batch_cas_rejects_stale_expectation() {
        let (store, batch, units) = seed();
        let batch_id = batch.id;
        store.insert_batch_with_units(batch, units).await.unwrap();

        let applied = store
            .transition_batch(
                batch_id,
                BatchState::Processing,
                &BatchEvent::Suspend,
                BatchState::Suspended,
            )
            .await
            .unwrap();
        assert!(applied);

        // A second actor still assuming Processing loses the race
        let applied = store
            .transition_batch(
                batch_id,
                BatchState::Processing,
                &BatchEvent::Cancel(None),
                BatchState::Canceled,
            )
            .await
            .unwrap();
        assert!(!applied);
        let stored = store.batch(batch_id).await.unwrap().unwrap();
        assert_eq!(stored.state, BatchState::Suspended);
    }

    #[tokio::test]
    async fn test_unit_fail_records_error_detail() {
        let (store, batch, units) = seed();
        let unit_id = units[0].id;
        store.insert_batch_with_units(batch, units).await.unwrap();

        store
            .transition_unit(unit_id, UnitState::New, &UnitEvent::Start, UnitState::Processing)
            .await
            .unwrap();
        store
            .transition_unit(
                unit_id,
                UnitState::Processing,
                &UnitEvent::fail_with_error("checksum mismatch"),
                UnitState::Failed,
            )
            .await
            .unwrap();

        let unit = store.unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.state, UnitState::Failed);
        assert_eq!(unit.last_error.as_deref(), Some("checksum mismatch"));

        let history = store.unit_transition_history(unit_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, "start");
        assert_eq!(history[1].event_type, "fail");
    }

    #[tokio::test]
    async fn test_cancellation_reason_persisted() {
        let (store, batch, units) = seed();
        let batch_id = batch.id;
        store.insert_batch_with_units(batch, units).await.unwrap();

        store
            .transition_batch(
                batch_id,
                BatchState::Processing,
                &BatchEvent::cancel_with_reason("operator request"),
                BatchState::Canceled,
            )
            .await
            .unwrap();

        let stored = store.batch(batch_id).await.unwrap().unwrap();
        assert_eq!(stored.state, BatchState::Canceled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some("operator request"));
    }

    #[tokio::test]
    async fn test_counts_snapshot() {
        let (store, batch, units) = seed();
        let batch_id = batch.id;
        store
            .insert_batch_with_units(batch, units.clone())
            .await
            .unwrap();

        store
            .transition_unit(units[0].id, UnitState::New, &UnitEvent::Start, UnitState::Processing)
            .await
            .unwrap();
        store
            .transition_unit(
                units[0].id,
                UnitState::Processing,
                &UnitEvent::Complete,
                UnitState::Processed,
            )
            .await
            .unwrap();

        let counts = store.unit_state_counts(batch_id).await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.new, 2);
        assert_eq!(counts.processed, 1);
        assert!(!counts.all_terminal());
    }
}
