//! Storage backends for contestants, the vote ledger and system settings.
//!
//! A [`Backend`] owns all three kinds of data. Callers pick one backend when
//! a session or server starts and pass it around by reference.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Contestant, SystemConfig, VoterRecord};

mod local;
mod mongo;
mod remote;
mod storage;

pub use local::{keys, KvStore, LocalBackend};
pub use mongo::MongoBackend;
pub use remote::RemoteBackend;
pub use storage::Storage;

/// A backend shared between request handlers or session components.
pub type SharedBackend = Arc<dyn Backend>;

#[rocket::async_trait]
pub trait Backend: Send + Sync {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    /// Every contestant, in listing order.
    async fn contestants(&self) -> Result<Vec<Contestant>>;

    async fn add_contestant(&self, contestant: Contestant) -> Result<()>;

    /// Remove the contestant with the given ID. Removing an unknown ID is not
    /// an error.
    async fn remove_contestant(&self, id: &str) -> Result<()>;

    /// Record that `email` voted for `contestant_id` and count the vote.
    ///
    /// At most one call per email ever succeeds. Fails with
    /// [`Error::AlreadyVoted`](crate::error::Error::AlreadyVoted) if the
    /// email has voted before and with
    /// [`Error::VotingClosed`](crate::error::Error::VotingClosed) if `now`
    /// is past the deadline this backend holds. Backends that hold the data
    /// themselves are the authority on the deadline; others defer to the
    /// endpoint they forward to.
    async fn cast_vote(
        &self,
        email: &str,
        contestant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Look up the ledger entry for `email`. Never creates one.
    async fn vote_status(&self, email: &str) -> Result<VoterRecord>;

    async fn system_config(&self) -> Result<SystemConfig>;

    async fn save_system_config(&self, config: &SystemConfig) -> Result<()>;

    /// Clear all contestant and vote data.
    async fn reset(&self) -> Result<()>;
}
