pub mod core;

// Re-export core models for easy access
pub use core::batch::Batch;
pub use core::unit::Unit;
