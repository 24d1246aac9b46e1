pub mod api;
pub mod event;

pub use api::{ChatRequest, DataPreview, RouteMeta, ThreadRef};
pub use event::{FinalAnswer, Frame, SemanticEvent, ToolEvent, ToolPhase};
