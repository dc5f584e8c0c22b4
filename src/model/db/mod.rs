//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - Contestant IDs double as MongoDB's `_id`.
//! - Book-keeping needed for atomic vote counting is stored alongside the
//!   public data and stripped on conversion.

mod contestant;
pub use contestant::DbContestant;

mod system_config;
pub use system_config::{DbSystemConfig, SYSTEM_CONFIG_ID};

mod vote;
pub use vote::DbVote;
