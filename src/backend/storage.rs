use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Contestant, SystemConfig, VoterRecord};

use super::{Backend, LocalBackend, RemoteBackend};

/// The backend a client session talks to.
///
/// Selected once: when a remote endpoint address is configured every
/// operation goes to the endpoint, otherwise to the local store. In remote
/// mode, contestant and settings reads that fail fall back to whatever the
/// local store last cached, and successful reads refresh that cache. A failed
/// vote status read reports "not voted"; the endpoint still refuses a second
/// vote. Writes never fall back; their errors reach the caller.
pub struct Storage {
    local: LocalBackend,
    remote: Option<RemoteBackend>,
}

impl Storage {
    /// Use the local store only.
    pub fn local(local: LocalBackend) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// Forward to `remote`, keeping `local` as the read cache.
    pub fn remote(local: LocalBackend, remote: RemoteBackend) -> Self {
        Self {
            local,
            remote: Some(remote),
        }
    }

    /// Pick the backend for a session. An explicit `api_url` wins over the
    /// address saved in the local store; a blank one means "use the saved one".
    pub async fn select(local: LocalBackend, api_url: Option<&str>) -> Result<Self> {
        let explicit = api_url.map(str::trim).filter(|url| !url.is_empty());
        let url = match explicit {
            Some(url) => Some(url.to_string()),
            None => local.api_url().await,
        };
        Ok(match url {
            Some(url) => {
                info!("Using remote endpoint {url}");
                Self::remote(local, RemoteBackend::new(url)?)
            }
            None => {
                info!("Using local store");
                Self::local(local)
            }
        })
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// The device-local store, for settings that never leave this device.
    pub fn local_store(&self) -> &LocalBackend {
        &self.local
    }

    fn primary(&self) -> &dyn Backend {
        match &self.remote {
            Some(remote) => remote,
            None => &self.local,
        }
    }
}

#[rocket::async_trait]
impl Backend for Storage {
    fn name(&self) -> &'static str {
        self.primary().name()
    }

    async fn contestants(&self) -> Result<Vec<Contestant>> {
        if let Some(remote) = &self.remote {
            match remote.contestants().await {
                Ok(contestants) => {
                    if let Err(e) = self.local.cache_contestants(&contestants).await {
                        warn!("Could not cache contestants locally: {e}");
                    }
                    return Ok(contestants);
                }
                Err(e) => warn!("Falling back to local contestants: {e}"),
            }
        }
        self.local.contestants().await
    }

    async fn add_contestant(&self, contestant: Contestant) -> Result<()> {
        self.primary().add_contestant(contestant).await
    }

    async fn remove_contestant(&self, id: &str) -> Result<()> {
        self.primary().remove_contestant(id).await
    }

    async fn cast_vote(
        &self,
        email: &str,
        contestant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.primary().cast_vote(email, contestant_id, now).await
    }

    async fn vote_status(&self, email: &str) -> Result<VoterRecord> {
        match &self.remote {
            // The local ledger belongs to a different contest than the
            // endpoint's, so it is never consulted in remote mode.
            Some(remote) => match remote.vote_status(email).await {
                Ok(record) => Ok(record),
                Err(e) => {
                    warn!("Could not read vote status of {email}, reporting not voted: {e}");
                    Ok(VoterRecord::not_voted())
                }
            },
            None => self.local.vote_status(email).await,
        }
    }

    async fn system_config(&self) -> Result<SystemConfig> {
        if let Some(remote) = &self.remote {
            match remote.system_config().await {
                Ok(config) => {
                    if let Err(e) = self.local.save_system_config(&config).await {
                        warn!("Could not cache settings locally: {e}");
                    }
                    return Ok(config);
                }
                Err(e) => warn!("Falling back to local settings: {e}"),
            }
        }
        self.local.system_config().await
    }

    async fn save_system_config(&self, config: &SystemConfig) -> Result<()> {
        self.primary().save_system_config(config).await
    }

    async fn reset(&self) -> Result<()> {
        self.primary().reset().await
    }
}
