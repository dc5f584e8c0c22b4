//! A logged-in user's view of the contest and the actions they can take.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::SharedBackend;
use crate::error::{Error, Result};
use crate::model::{
    eligibility::is_voting_closed,
    results::{standings, total_votes, vote_share, Standing},
    Contestant, Eligibility, LoginPolicy, NewContestant, SystemConfig, User, VoterRecord,
};

/// Everything needed to render the voting page for one user at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotView {
    pub banner_url: String,
    pub vote_deadline: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub eligibility: Eligibility,
    /// Hidden unless the user may see results.
    pub total_votes: Option<u64>,
    pub entries: Vec<BallotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotEntry {
    pub id: String,
    pub number: String,
    pub name: String,
    pub department: String,
    pub image_url: String,
    /// Hidden unless the user may see results.
    pub votes: Option<u64>,
    /// Percentage of all votes; hidden unless the user may see results.
    pub share: Option<f64>,
    pub is_voted_for: bool,
}

impl BallotView {
    pub fn new(
        contestants: Vec<Contestant>,
        config: SystemConfig,
        user: &User,
        eligibility: Eligibility,
    ) -> Self {
        let show = eligibility.can_see_results;
        let total = total_votes(&contestants);
        let voted_for = user.record.voted_for_id.as_deref();
        let entries = contestants
            .into_iter()
            .map(|c| BallotEntry {
                is_voted_for: voted_for == Some(c.id.as_str()),
                votes: show.then_some(c.votes),
                share: show.then(|| vote_share(c.votes, total)),
                id: c.id,
                number: c.number,
                name: c.name,
                department: c.department,
                image_url: c.image_url,
            })
            .collect();
        Self {
            banner_url: config.banner_url,
            vote_deadline: config.vote_deadline,
            eligibility,
            total_votes: show.then_some(total),
            entries,
        }
    }
}

/// Marks a session action as in flight for as long as it is held.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            Err(Error::Busy)
        } else {
            Ok(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A logged-in user bound to the backend chosen for this session.
///
/// Only one vote or admin action runs at a time; a second one started while
/// the first is awaiting the backend fails with [`Error::Busy`].
pub struct Session {
    backend: SharedBackend,
    user: Mutex<User>,
    in_flight: AtomicBool,
}

impl Session {
    /// Check the email against `policy` and load the user's ledger entry.
    pub async fn login(backend: SharedBackend, policy: &LoginPolicy, email: &str) -> Result<Self> {
        let (email, is_admin) = policy.admit(email)?;
        let record = backend.vote_status(&email).await?;
        info!(
            "{email} logged in{} (has voted: {})",
            if is_admin { " as admin" } else { "" },
            record.has_voted
        );
        Ok(Self {
            backend,
            user: Mutex::new(User {
                email,
                is_admin,
                record,
            }),
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn user(&self) -> User {
        self.lock_user().clone()
    }

    fn lock_user(&self) -> MutexGuard<'_, User> {
        // The guarded data is a plain value; a panic elsewhere cannot leave it
        // half-written.
        self.user.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_admin(&self) -> Result<()> {
        let user = self.lock_user();
        if user.is_admin {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!("{} is not an admin", user.email)))
        }
    }

    /// Reload the user's ledger entry.
    pub async fn refresh(&self) -> Result<User> {
        let email = self.lock_user().email.clone();
        let record = self.backend.vote_status(&email).await?;
        let mut user = self.lock_user();
        user.record = record;
        Ok(user.clone())
    }

    /// Load the current state of the contest as this user may see it.
    pub async fn ballot(&self, now: DateTime<Utc>) -> Result<BallotView> {
        let contestants = self.backend.contestants().await?;
        let config = self.backend.system_config().await?;
        let user = self.refresh().await?;
        let eligibility =
            Eligibility::evaluate(now, config.vote_deadline, &user.record, user.is_admin);
        Ok(BallotView::new(contestants, config, &user, eligibility))
    }

    /// Cast this user's one vote.
    ///
    /// The deadline and repeat-vote checks here only spare a round trip; the
    /// backend makes the final decision.
    pub async fn vote(&self, contestant_id: &str, now: DateTime<Utc>) -> Result<()> {
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        let user = self.user();
        if user.record.has_voted {
            return Err(Error::AlreadyVoted);
        }
        let config = self.backend.system_config().await?;
        if is_voting_closed(now, config.vote_deadline) {
            return Err(Error::VotingClosed);
        }

        self.backend
            .cast_vote(&user.email, contestant_id, now)
            .await?;
        self.lock_user().record = VoterRecord::voted_for(contestant_id);
        Ok(())
    }

    /// Add a contestant with a fresh ID and zero votes.
    pub async fn add_contestant(
        &self,
        new: NewContestant,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        self.require_admin()?;
        let new = new.validated().map_err(Error::BadRequest)?;
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        let contestant = new.into_contestant(now);
        self.backend.add_contestant(contestant.clone()).await?;
        info!("Added contestant {} ({})", contestant.id, contestant.name);
        Ok(contestant)
    }

    pub async fn remove_contestant(&self, id: &str) -> Result<()> {
        self.require_admin()?;
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        self.backend.remove_contestant(id).await?;
        info!("Removed contestant {id}");
        Ok(())
    }

    pub async fn update_config(
        &self,
        banner_url: &str,
        vote_deadline: Option<DateTime<Utc>>,
    ) -> Result<SystemConfig> {
        self.require_admin()?;
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        let config = SystemConfig::new(banner_url.trim(), vote_deadline);
        self.backend.save_system_config(&config).await?;
        Ok(config)
    }

    /// Clear all contestant and vote data.
    pub async fn reset(&self) -> Result<()> {
        self.require_admin()?;
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        self.backend.reset().await?;
        self.refresh().await?;
        Ok(())
    }

    /// The admin results table, best first.
    pub async fn standings(&self) -> Result<Vec<Standing>> {
        self.require_admin()?;
        Ok(standings(&self.backend.contestants().await?))
    }
}
