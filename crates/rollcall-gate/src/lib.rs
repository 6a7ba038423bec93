//! rollcall-gate: the attendance-marking use case around face verification.
//!
//! A capture is verified against the user's reference photo; only an
//! accepted capture is stored durably and handed to the attendance ledger.

pub mod config;
pub mod engine;
pub mod gate;
pub mod ledger;

pub use config::{Config, DEFAULT_MAX_CONCURRENT_VERIFICATIONS, DEFAULT_VERIFY_TIMEOUT_SECS};
pub use engine::EngineHandle;
pub use gate::{AttendanceGate, GateError, MarkOutcome, MarkRequest, NOT_RECOGNIZED_MESSAGE};
pub use ledger::{AttendanceLedger, AttendanceRecord, AttendanceStatus, LedgerError, MarkedBy};
