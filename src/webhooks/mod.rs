//! Provider webhook ingestion: payload decoding, sanitising, dispatch, and
//! the per-type state transitions.

mod dispatcher;
pub mod handlers;
mod payload;
mod sanitize;

pub use dispatcher::{ProcessOptions, ProcessResult, process, process_at};
pub use payload::{
    CurrencyAdjustment, CurrencyPayload, EventEnvelope, EventPayload, EventType,
    ExperimentPayload,
};
pub use sanitize::sanitize_event;
