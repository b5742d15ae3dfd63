//! Spaced-repetition review scheduling for Hebrew-script flashcards.
//!
//! # Examples
//!
//! Synchronous usage with [`core::scheduler::Scheduler`]:
//! ```
//! use std::sync::Arc;
//!
//! use alefbet::{
//!     catalog::{Catalog, Flashcard},
//!     config::SchedulePolicy,
//!     core::{ledger::EnrollmentLedger, scheduler::Scheduler},
//! };
//!
//! let mut catalog = Catalog::new();
//! catalog
//!     .insert_flashcard(Flashcard { id: 1, front: "א".to_string(), back: "alef".to_string() })
//!     .expect("catalog");
//! let mut scheduler = Scheduler::new(
//!     EnrollmentLedger::new(),
//!     Arc::new(catalog),
//!     SchedulePolicy::default(),
//! ).expect("policy");
//!
//! scheduler.enroll(7, 1, 1_000).expect("enroll");
//! assert_eq!(scheduler.due_for_review(7, 1_000).len(), 1);
//!
//! let outcome = scheduler.mark_correct(7, 1, 1_000).expect("review");
//! assert_eq!(outcome.record.next_review_at, 1_075);
//! assert!(scheduler.due_for_review(7, 1_010).is_empty());
//! ```
//!
//! Runtime usage with SQLite journaling:
//! ```no_run
//! use std::sync::Arc;
//!
//! use alefbet::{
//!     config::SchedulePolicy,
//!     core::scheduler::Scheduler,
//!     persist::sqlite::SqliteOpSink,
//!     runtime::handle::{spawn_scheduler, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteOpSink::open("alefbet.db").expect("open sqlite");
//! let catalog = Arc::new(sink.load_catalog().expect("catalog"));
//! let ledger = sink.load_ledger().expect("ledger");
//! let scheduler = Scheduler::new(ledger, catalog, SchedulePolicy::from_env().expect("policy"))
//!     .expect("scheduler");
//! let handle = spawn_scheduler(scheduler, Some(Box::new(sink)), RuntimeConfig::default());
//! handle.enroll(7, 1, 1_000).await.expect("enroll");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Flashcard and quiz item catalog.
pub mod catalog;
/// Scheduling policy configuration.
pub mod config;
/// Enrollment ledger, scheduler and level arithmetic.
pub mod core;
/// Enrollment records and recall outcomes.
pub mod enrollment;
/// Error taxonomy.
pub mod error;
/// Tracing setup.
pub mod logging;
/// Journaled mutation ops.
pub mod op;
/// Op sink abstraction and SQLite storage.
pub mod persist;
/// Multiple-choice quiz sampling.
pub mod quiz;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
