//! Streaming answer protocol client.
//!
//! Implements the client side of the `/api/answer` stream: blank-line
//! framed records carrying JSON payloads with a `type` discriminant.
//!
//! # Module structure
//! - `decoder` - byte chunks to framed `data: ` records (no semantics)
//! - `frame` - frame classification and terminal-payload normalization
//! - `session` - per-query session controller: watchdog, cancellation,
//!   thinking accumulation, single-terminal-event guarantee

pub mod decoder;
pub mod frame;
pub mod session;

pub use decoder::{FrameDecoder, FIELD_MARKER};
pub use frame::{
    classify, FinalResult, Frame, ResultStatus, TerminalFrame, ThinkingEntry, ThinkingKind,
    GENERIC_ERROR,
};
pub use session::{
    start_session, start_session_with_timeout, SessionCancel, SessionEvent, SessionHandle,
    SessionState, CLOSED_MESSAGE, LIVENESS_TIMEOUT, TIMEOUT_MESSAGE,
};
