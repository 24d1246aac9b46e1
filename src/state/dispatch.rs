use super::accumulator::{DispatchOutcome, StreamAccumulator};
use crate::types::{Frame, SemanticEvent};

/// Interprets `frame` and applies it to `accumulator`.
///
/// Unknown kinds are ignored so newer servers can add event types.
pub fn dispatch(accumulator: &mut StreamAccumulator, frame: &Frame) -> DispatchOutcome {
    if !accumulator.is_live {
        tracing::debug!(kind = %frame.kind, "dropping frame for closed stream");
        return DispatchOutcome::Rejected;
    }

    let Some(event) = SemanticEvent::from_frame(frame) else {
        tracing::debug!(kind = %frame.kind, "ignoring unrecognized event kind");
        return DispatchOutcome::Unchanged;
    };

    let outcome = accumulator.apply(event);
    tracing::trace!(kind = %frame.kind, ?outcome, "frame dispatched");
    outcome
}
