//! Request coordination: match, bind, invoke, coerce, contain failures.

mod coerce;
mod context;
mod coordinator;
mod failure;

pub use coerce::coerce;
pub use context::RequestContext;
pub use coordinator::{decode_path, Coordinator, CoordinatorBuilder};
pub use failure::{contain, DiagnosticRecord, DiagnosticSink, FailureBoundary, MemorySink, TracingSink};
