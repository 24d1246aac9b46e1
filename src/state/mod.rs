pub mod accumulator;
pub mod dispatch;

pub use accumulator::{DispatchOutcome, StreamAccumulator};
pub use dispatch::dispatch;
