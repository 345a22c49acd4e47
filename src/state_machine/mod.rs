// State machine module for batch coordination
//
// Per-unit and per-batch lifecycle management with transition guards.
// Aggregate transitions persist through compare-and-swap on the state store
// so that concurrent workers can never double-apply a terminal transition.

pub mod batch_state_machine;
pub mod errors;
pub mod events;
pub mod guards;
pub mod states;
pub mod unit_state_machine;

// Re-export main types for convenient access
pub use batch_state_machine::BatchStateMachine;
pub use errors::{GuardError, StateMachineError, StateMachineResult};
pub use events::{BatchEvent, UnitEvent};
pub use guards::StateGuard;
pub use states::{BatchState, UnitState};
pub use unit_state_machine::UnitStateMachine;
