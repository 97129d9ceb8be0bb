//! Achievement engine for a student-organization chapter: a SQLite-backed
//! ledger of per-user achievement progress, recomputed from domain history
//! (officer terms, event attendance, exam uploads, project reports) every
//! time a record is saved.

pub mod candidates;
pub mod config;
pub mod rules;
pub mod storage;
pub mod term;

pub use candidates::{CandidateStore, RequirementType};
pub use config::EngineConfig;
pub use rules::{dispatch, Assignment, AssignmentWriter, DomainEvent};
pub use storage::Storage;
pub use term::{Season, Term};
