//! Fieldguide - Adaptive interview session engine
//!
//! Fieldguide follows the person being interviewed through a questionnaire,
//! watches how they answer for signs of friction, and decides when to surface
//! a single nudge: answer write → signal detection (hesitation, churn, contradiction)
//! → fatigue accumulation → nudge state machine, with an append-only audit
//! trail of every state change.
//!
//! ## Modules
//!
//! - **Session**: The owned aggregate every UI event goes through
//! - **Script**: Deterministic replay of recorded UI events on a manual clock

pub mod answers;
pub mod audit;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod contradiction;
pub mod error;
pub mod fatigue;
pub mod nudge;
pub mod script;
pub mod session;
pub mod signals;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use audit::{AuditEvent, AuditKind, AuditLog, AuditRecord};
pub use catalog::{Catalog, Question};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use contradiction::{ContradictionRule, RuleTable};
pub use error::SessionError;
pub use nudge::{Nudge, NudgeDismissal, NudgeState};
pub use script::{parse_script, replay_script, ScriptEvent, ScriptLine, ScriptRunner};
pub use session::{Session, SessionSnapshot};
pub use types::{AnswerValue, BehaviorSignal, NudgeAction, ReadingLevel, SignalKind};

/// Library version
pub const FIELDGUIDE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI consumers
pub const PRODUCER_NAME: &str = "fieldguide";
