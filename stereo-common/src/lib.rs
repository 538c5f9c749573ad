//! # Stereo Common Library
//!
//! Shared code for the stereotype annotation survey:
//! - Stereotype definitions loading
//! - Participant and region selection validation
//! - Per-region submission parsing and the quiz state machine
//! - Result persistence and schema bootstrap
//! - Report aggregation and spreadsheet export
//! - Configuration loading

pub mod config;
pub mod db;
pub mod definitions;
pub mod error;
pub mod quiz;
pub mod report;
pub mod selection;
pub mod submission;

pub use definitions::{DefinitionsStore, StereotypeItem};
pub use error::{Error, Result};
pub use quiz::QuizState;
pub use selection::Participant;
