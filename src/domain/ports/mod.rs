pub mod errors;
pub mod execution;

pub use errors::AegisError;
pub use execution::{ExecutionEvent, ExecutionStrategy};
