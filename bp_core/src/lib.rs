#![forbid(unsafe_code)]

//! Core domain model and business logic for the blood-pressure journal.
//!
//! This crate provides:
//! - Domain types (measurements, saved records)
//! - Input validation against physiological bounds
//! - Wall-clock-anchored countdown timers (rest and cooldown)
//! - The measurement workflow state machine
//! - Persistence (append-only record store, CSV export, config)

pub mod types;
pub mod error;
pub mod logging;
pub mod config;
pub mod validate;
pub mod timer;
pub mod store;
pub mod workflow;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use validate::validate;
pub use timer::{Clock, FileTimerStore, SystemClock, TimerEvent, TimerService, TimerSlot, TimerStore};
pub use store::{read_records, JsonlRecordStore, RecordStore};
pub use workflow::{Stage, Workflow};
pub use export::records_to_csv;
