//! Enrollment ledger, review scheduler and level arithmetic.

/// Authoritative enrollment records and experience totals.
pub mod ledger;
/// Experience to level conversion.
pub mod progress;
/// Recall-outcome transitions and due/learnable queries.
pub mod scheduler;
