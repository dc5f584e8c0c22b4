use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json;
use rocket::tokio::sync::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    contestant::seed_contestants,
    eligibility::is_voting_closed,
    ledger::Ledger,
    system_config::{format_deadline, parse_deadline},
    Contestant, SystemConfig, VoterRecord,
};

use super::Backend;

/// Names of the entries kept in the local store.
pub mod keys {
    pub const CONTESTANTS: &str = "votehub_contestants";
    pub const USERS: &str = "votehub_users";
    pub const BANNER: &str = "votehub_banner";
    pub const VOTE_DEADLINE: &str = "votehub_deadline";
    pub const API_URL: &str = "votehub_api_url";
}

/// File the store is kept in, inside its data directory.
const STORE_FILE: &str = "store.json";

/// A persistent string-to-string map.
///
/// Every mutation rewrites the whole file through a temporary file and a
/// rename, so a batch passed to [`KvStore::update`] lands on disk entirely or
/// not at all.
#[derive(Debug, Default)]
pub struct KvStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl KvStore {
    /// Open the store in `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened local store {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.update([(key, Some(value.into()))])
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.update([(key, None)])
    }

    /// Apply several writes at once. `None` removes the key.
    pub fn update<'a, I>(&mut self, changes: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Option<String>)>,
    {
        let mut entries = self.entries.clone();
        for (key, value) in changes {
            match value {
                Some(value) => entries.insert(key.to_string(), value),
                None => entries.remove(key),
            };
        }
        self.persist(&entries)?;
        self.entries = entries;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|text| serde_json::from_str::<T>(text))
            .transpose()
            .map_err(Error::from)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(path) = &self.path {
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
            fs::rename(&tmp, path)?;
        }
        Ok(())
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Option<String>> {
    Ok(Some(serde_json::to_string(value)?))
}

/// A backend kept in a [`KvStore`] on this device.
///
/// All operations take the store lock, so the vote check-then-write is atomic
/// within the process.
pub struct LocalBackend {
    store: Mutex<KvStore>,
}

impl LocalBackend {
    pub fn new(store: KvStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Open the persistent store in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(KvStore::open(dir)?))
    }

    pub fn in_memory() -> Self {
        Self::new(KvStore::in_memory())
    }

    /// The remote endpoint address saved on this device, if any.
    pub async fn api_url(&self) -> Option<String> {
        let store = self.store.lock().await;
        store
            .get(keys::API_URL)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    /// Save the remote endpoint address. An empty address clears it, which
    /// selects this local backend from the next session on.
    pub async fn save_api_url(&self, url: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        let url = url.trim();
        if url.is_empty() {
            store.remove(keys::API_URL)
        } else {
            store.set(keys::API_URL, url)
        }
    }

    /// Overwrite the stored contestants with a copy fetched from elsewhere.
    pub async fn cache_contestants(&self, contestants: &[Contestant]) -> Result<()> {
        let mut store = self.store.lock().await;
        store.update([(keys::CONTESTANTS, to_json(contestants)?)])
    }
}

fn read_contestants(store: &KvStore) -> Result<Vec<Contestant>> {
    Ok(store
        .get_json(keys::CONTESTANTS)?
        .unwrap_or_else(seed_contestants))
}

fn read_ledger(store: &KvStore) -> Result<Ledger> {
    Ok(store.get_json(keys::USERS)?.unwrap_or_default())
}

fn read_config(store: &KvStore) -> SystemConfig {
    let deadline = store
        .get(keys::VOTE_DEADLINE)
        .and_then(|text| match parse_deadline(text) {
            Ok(deadline) => deadline,
            Err(e) => {
                warn!("Ignoring stored vote deadline: {e}");
                None
            }
        });
    SystemConfig::new(store.get(keys::BANNER).unwrap_or_default(), deadline)
}

/// Add one vote to the contestant with the given ID.
fn increment_vote(contestants: &mut [Contestant], id: &str) -> Result<()> {
    let contestant = contestants
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::not_found(format!("Contestant {id}")))?;
    contestant.votes += 1;
    Ok(())
}

#[rocket::async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn contestants(&self) -> Result<Vec<Contestant>> {
        let store = self.store.lock().await;
        read_contestants(&store)
    }

    async fn add_contestant(&self, contestant: Contestant) -> Result<()> {
        let mut store = self.store.lock().await;
        let mut contestants = read_contestants(&store)?;
        if contestants.iter().any(|c| c.id == contestant.id) {
            return Err(Error::BadRequest(format!(
                "Contestant ID already in use: {}",
                contestant.id
            )));
        }
        contestants.push(contestant);
        store.update([(keys::CONTESTANTS, to_json(&contestants)?)])
    }

    async fn remove_contestant(&self, id: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        let mut contestants = read_contestants(&store)?;
        let before = contestants.len();
        contestants.retain(|c| c.id != id);
        if contestants.len() == before {
            debug!("Contestant {id} not present, nothing to remove");
            return Ok(());
        }
        store.update([(keys::CONTESTANTS, to_json(&contestants)?)])
    }

    async fn cast_vote(
        &self,
        email: &str,
        contestant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut store = self.store.lock().await;

        let mut ledger = read_ledger(&store)?;
        if ledger.get(email).map_or(false, |record| record.has_voted) {
            return Err(Error::AlreadyVoted);
        }
        if is_voting_closed(now, read_config(&store).vote_deadline) {
            return Err(Error::VotingClosed);
        }

        let mut contestants = read_contestants(&store)?;
        increment_vote(&mut contestants, contestant_id)?;
        ledger.insert(email.to_string(), VoterRecord::voted_for(contestant_id));

        // Ledger and counter reach disk together.
        store.update([
            (keys::USERS, to_json(&ledger)?),
            (keys::CONTESTANTS, to_json(&contestants)?),
        ])?;
        info!("Recorded local vote by {email} for contestant {contestant_id}");
        Ok(())
    }

    async fn vote_status(&self, email: &str) -> Result<VoterRecord> {
        let store = self.store.lock().await;
        Ok(read_ledger(&store)?.remove(email).unwrap_or_default())
    }

    async fn system_config(&self) -> Result<SystemConfig> {
        let store = self.store.lock().await;
        Ok(read_config(&store))
    }

    async fn save_system_config(&self, config: &SystemConfig) -> Result<()> {
        let mut store = self.store.lock().await;
        store.update([
            (keys::BANNER, Some(config.banner_url.clone())),
            (keys::VOTE_DEADLINE, config.vote_deadline.map(format_deadline)),
        ])
    }

    async fn reset(&self) -> Result<()> {
        let mut store = self.store.lock().await;
        store.update([
            (keys::CONTESTANTS, None),
            (keys::USERS, None),
            (keys::BANNER, None),
            (keys::VOTE_DEADLINE, None),
        ])?;
        warn!("Local store reset");
        Ok(())
    }
}
