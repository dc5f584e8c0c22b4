use chrono::{DateTime, Utc};
use mongodb::{
    bson::doc,
    options::{FindOptions, ReplaceOptions},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    db::{DbContestant, DbSystemConfig, DbVote, SYSTEM_CONFIG_ID},
    eligibility::is_voting_closed,
    mongodb::{is_duplicate_key_error, Coll},
    Contestant, SystemConfig, VoterRecord,
};

use super::Backend;

/// The authoritative backend behind the voting endpoint.
///
/// A vote is committed in three steps, each safe to repeat:
///
/// 1. insert a ledger row for the email; the unique index turns a second
///    attempt into a duplicate-key error,
/// 2. increment the contestant's counter, conditional on the email not yet
///    being in the contestant's `voters` list,
/// 3. mark the ledger row as counted.
///
/// Step 2 is the commit point: whichever call's update actually modifies the
/// contestant is the one vote that counts. An attempt that finds an
/// uncounted row for the same contestant (left behind by a failure between
/// steps 1 and 2) resumes at step 2.
pub struct MongoBackend {
    contestants: Coll<DbContestant>,
    votes: Coll<DbVote>,
    config: Coll<DbSystemConfig>,
}

impl MongoBackend {
    pub fn new(db: &Database) -> Self {
        Self {
            contestants: Coll::from_db(db),
            votes: Coll::from_db(db),
            config: Coll::from_db(db),
        }
    }

    /// Reserve the ledger row for this email, or pick up an interrupted vote.
    async fn reserve_vote(
        &self,
        email: &str,
        contestant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(existing) = self.votes.find_one(doc! { "email": email }, None).await? {
            if existing.counted || existing.contestant_id != contestant_id {
                return Err(Error::AlreadyVoted);
            }
            warn!("Resuming uncounted vote by {email} for contestant {contestant_id}");
            return Ok(());
        }

        if is_voting_closed(now, self.system_config().await?.vote_deadline) {
            return Err(Error::VotingClosed);
        }
        let exists = self
            .contestants
            .count_documents(doc! { "_id": contestant_id }, None)
            .await?;
        if exists == 0 {
            return Err(Error::not_found(format!("Contestant {contestant_id}")));
        }

        match self
            .votes
            .insert_one(DbVote::new(email, contestant_id, now), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::AlreadyVoted),
            Err(e) => Err(e.into()),
        }
    }
}

#[rocket::async_trait]
impl Backend for MongoBackend {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn contestants(&self) -> Result<Vec<Contestant>> {
        // IDs are strings, so `_id` order is not creation order.
        let options = FindOptions::builder().sort(doc! { "$natural": 1 }).build();
        let contestants: Vec<DbContestant> = self
            .contestants
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(contestants.into_iter().map(Contestant::from).collect())
    }

    async fn add_contestant(&self, contestant: Contestant) -> Result<()> {
        let id = contestant.id.clone();
        match self
            .contestants
            .insert_one(DbContestant::from(contestant), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::BadRequest(format!(
                "Contestant ID already in use: {id}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_contestant(&self, id: &str) -> Result<()> {
        let result = self
            .contestants
            .delete_one(doc! { "_id": id }, None)
            .await?;
        if result.deleted_count == 0 {
            debug!("Contestant {id} not present, nothing to remove");
        }
        Ok(())
    }

    async fn cast_vote(
        &self,
        email: &str,
        contestant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.reserve_vote(email, contestant_id, now).await?;

        let filter = doc! { "_id": contestant_id, "voters": { "$ne": email } };
        let update = doc! { "$inc": { "votes": 1 }, "$push": { "voters": email } };
        let result = self.contestants.update_one(filter, update, None).await?;
        if result.modified_count == 0 {
            // Either a concurrent attempt counted this vote first, or the
            // contestant was removed after the ledger row was written.
            let counted = self
                .contestants
                .count_documents(doc! { "_id": contestant_id, "voters": email }, None)
                .await?;
            return Err(if counted > 0 {
                Error::AlreadyVoted
            } else {
                Error::not_found(format!("Contestant {contestant_id}"))
            });
        }

        self.votes
            .update_one(
                doc! { "email": email },
                doc! { "$set": { "counted": true } },
                None,
            )
            .await?;
        info!("Recorded vote by {email} for contestant {contestant_id}");
        Ok(())
    }

    async fn vote_status(&self, email: &str) -> Result<VoterRecord> {
        let vote = self.votes.find_one(doc! { "email": email }, None).await?;
        Ok(vote
            .map(|vote| VoterRecord::voted_for(vote.contestant_id))
            .unwrap_or_default())
    }

    async fn system_config(&self) -> Result<SystemConfig> {
        let config = self
            .config
            .find_one(doc! { "_id": SYSTEM_CONFIG_ID }, None)
            .await?;
        Ok(config.map(SystemConfig::from).unwrap_or_default())
    }

    async fn save_system_config(&self, config: &SystemConfig) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.config
            .replace_one(
                doc! { "_id": SYSTEM_CONFIG_ID },
                DbSystemConfig::from(config),
                options,
            )
            .await?;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        // Settings survive a reset; only contest data is cleared.
        let contestants = self.contestants.delete_many(doc! {}, None).await?;
        let votes = self.votes.delete_many(doc! {}, None).await?;
        warn!(
            "Reset: removed {} contestants and {} votes",
            contestants.deleted_count, votes.deleted_count
        );
        Ok(())
    }
}

/// These tests need a live MongoDB server. Point `VOTEHUB_TEST_DB_URI` at one
/// and run with `--ignored`.
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mongodb::Client;
    use rocket::tokio;

    use super::*;
    use crate::model::mongodb::ensure_indexes_exist;

    async fn test_db() -> Database {
        let uri = std::env::var("VOTEHUB_TEST_DB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let client = Client::with_uri_str(uri).await.unwrap();
        let random: u32 = rand::random();
        let db = client.database(&format!("test{random}"));
        ensure_indexes_exist(&db).await.unwrap();
        db
    }

    async fn seeded(db: &Database) -> MongoBackend {
        let backend = MongoBackend::new(db);
        for id in ["1", "2"] {
            backend
                .add_contestant(Contestant::example(id, 0))
                .await
                .unwrap();
        }
        backend
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB server"]
    async fn one_vote_per_email() {
        let db = test_db().await;
        let backend = seeded(&db).await;

        backend.cast_vote("a@gmail.com", "1", Utc::now()).await.unwrap();
        let again = backend.cast_vote("a@gmail.com", "2", Utc::now()).await;
        assert!(matches!(again, Err(Error::AlreadyVoted)));

        let votes: Vec<u64> = backend
            .contestants()
            .await
            .unwrap()
            .iter()
            .map(|c| c.votes)
            .collect();
        assert_eq!(votes, vec![1, 0]);
        assert_eq!(
            backend.vote_status("a@gmail.com").await.unwrap(),
            VoterRecord::voted_for("1")
        );

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB server"]
    async fn interrupted_vote_is_counted_once() {
        let db = test_db().await;
        let backend = seeded(&db).await;

        // Simulate a failure right after the ledger row was written.
        Coll::<DbVote>::from_db(&db)
            .insert_one(DbVote::new("b@gmail.com", "2", Utc::now()), None)
            .await
            .unwrap();
        assert!(backend.vote_status("b@gmail.com").await.unwrap().has_voted);

        // A retry naming another contestant may not move the vote.
        let other = backend.cast_vote("b@gmail.com", "1", Utc::now()).await;
        assert!(matches!(other, Err(Error::AlreadyVoted)));

        backend.cast_vote("b@gmail.com", "2", Utc::now()).await.unwrap();
        let repeat = backend.cast_vote("b@gmail.com", "2", Utc::now()).await;
        assert!(matches!(repeat, Err(Error::AlreadyVoted)));

        let contestants = backend.contestants().await.unwrap();
        assert_eq!(contestants[1].votes, 1);
        assert_eq!(contestants[0].votes, 0);

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB server"]
    async fn concurrent_votes_commit_once() {
        let db = test_db().await;
        let backend = Arc::new(seeded(&db).await);

        let attempts: Vec<_> = (0..10)
            .map(|i| {
                let backend = backend.clone();
                let id = if i % 2 == 0 { "1" } else { "2" };
                tokio::spawn(async move { backend.cast_vote("c@gmail.com", id, Utc::now()).await })
            })
            .collect();
        let mut successes = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        let total: u64 = backend
            .contestants()
            .await
            .unwrap()
            .iter()
            .map(|c| c.votes)
            .sum();
        assert_eq!(total, 1);

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB server"]
    async fn reset_keeps_settings() {
        let db = test_db().await;
        let backend = seeded(&db).await;
        let config = SystemConfig::new("https://example.com/b.png", None);
        backend.save_system_config(&config).await.unwrap();
        backend.cast_vote("d@gmail.com", "1", Utc::now()).await.unwrap();

        backend.reset().await.unwrap();
        assert!(backend.contestants().await.unwrap().is_empty());
        assert!(!backend.vote_status("d@gmail.com").await.unwrap().has_voted);
        assert_eq!(backend.system_config().await.unwrap(), config);

        db.drop(None).await.unwrap();
    }
}
