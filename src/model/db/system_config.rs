use serde::{Deserialize, Serialize};

use crate::model::system_config::{format_deadline, parse_deadline, SystemConfig};

/// The configuration collection holds a single document with this ID.
pub const SYSTEM_CONFIG_ID: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSystemConfig {
    #[serde(rename = "_id")]
    pub id: String,
    pub banner_url: String,
    /// RFC 3339; absent when voting is unrestricted.
    #[serde(default)]
    pub vote_deadline: Option<String>,
}

impl From<&SystemConfig> for DbSystemConfig {
    fn from(config: &SystemConfig) -> Self {
        Self {
            id: SYSTEM_CONFIG_ID.to_string(),
            banner_url: config.banner_url.clone(),
            vote_deadline: config.vote_deadline.map(format_deadline),
        }
    }
}

impl From<DbSystemConfig> for SystemConfig {
    fn from(config: DbSystemConfig) -> Self {
        // Only ever written via `From<&SystemConfig>`, but be lenient with
        // documents edited by hand.
        let deadline = config
            .vote_deadline
            .as_deref()
            .map(parse_deadline)
            .and_then(|parsed| match parsed {
                Ok(deadline) => deadline,
                Err(e) => {
                    warn!("Ignoring stored vote deadline: {e}");
                    None
                }
            });
        SystemConfig::new(config.banner_url, deadline)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn unreadable_deadline_is_dropped() {
        let stored = DbSystemConfig {
            id: SYSTEM_CONFIG_ID.to_string(),
            banner_url: String::new(),
            vote_deadline: Some("whenever".to_string()),
        };
        assert_eq!(SystemConfig::from(stored), SystemConfig::default());
    }

    #[test]
    fn deadline_survives_storage() {
        let deadline = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let config = SystemConfig::new("https://example.com/banner.jpg", Some(deadline));
        let stored = DbSystemConfig::from(&config);
        assert_eq!(stored.vote_deadline.as_deref(), Some("2024-06-01T09:00:00Z"));
        assert_eq!(SystemConfig::from(stored), config);
    }
}
