use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Banner shown when none has been configured.
pub const DEFAULT_BANNER: &str = "https://picsum.photos/id/20/1200/400";

/// Process-wide settings managed by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSystemConfig")]
pub struct SystemConfig {
    pub banner_url: String,
    /// Voting is unrestricted when this is `None`.
    #[serde(serialize_with = "serialize_deadline")]
    pub vote_deadline: Option<DateTime<Utc>>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            banner_url: DEFAULT_BANNER.to_string(),
            vote_deadline: None,
        }
    }
}

impl SystemConfig {
    pub fn new(banner_url: impl Into<String>, vote_deadline: Option<DateTime<Utc>>) -> Self {
        let banner_url = banner_url.into();
        let banner_url = if banner_url.trim().is_empty() {
            DEFAULT_BANNER.to_string()
        } else {
            banner_url
        };
        Self {
            banner_url,
            vote_deadline,
        }
    }
}

/// The configuration as it arrives over the wire: remote endpoints may send
/// `null` or empty strings for either field.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSystemConfig {
    #[serde(default)]
    banner_url: Option<String>,
    #[serde(default)]
    vote_deadline: Option<String>,
}

impl TryFrom<RawSystemConfig> for SystemConfig {
    type Error = String;

    fn try_from(raw: RawSystemConfig) -> Result<Self, Self::Error> {
        let deadline = match raw.vote_deadline {
            Some(text) => parse_deadline(&text)?,
            None => None,
        };
        Ok(Self::new(raw.banner_url.unwrap_or_default(), deadline))
    }
}

fn serialize_deadline<S>(deadline: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match deadline {
        Some(deadline) => serializer.serialize_some(&format_deadline(*deadline)),
        None => serializer.serialize_none(),
    }
}

/// Format a deadline the way it is stored and sent: RFC 3339 in UTC.
pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored or submitted deadline.
///
/// Blank input means "no deadline". Full RFC 3339 timestamps are accepted, as
/// are the zone-less `YYYY-MM-DDTHH:MM[:SS]` values produced by date-time
/// pickers, which are taken to be UTC.
pub fn parse_deadline(text: &str) -> Result<Option<DateTime<Utc>>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Ok(deadline) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(deadline.with_timezone(&Utc)));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Some(Utc.from_utc_datetime(&naive)))
        .ok_or_else(|| format!("Unrecognised vote deadline '{text}'"))
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{serde_json, serde_json::json};

    use super::*;

    #[test]
    fn deadline_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_deadline("2024-01-01T00:00:00Z"), Ok(Some(expected)));
        assert_eq!(parse_deadline("2024-01-01T07:00:00+07:00"), Ok(Some(expected)));
        assert_eq!(parse_deadline("2024-01-01T00:00"), Ok(Some(expected)));
        assert_eq!(parse_deadline("  "), Ok(None));
        assert!(parse_deadline("next tuesday").is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SystemConfig =
            serde_json::from_value(json!({ "bannerUrl": "", "voteDeadline": "" })).unwrap();
        assert_eq!(config, SystemConfig::default());

        let config: SystemConfig = serde_json::from_value(json!({ "voteDeadline": null })).unwrap();
        assert_eq!(config.banner_url, DEFAULT_BANNER);
    }

    #[test]
    fn serialized_deadline_is_rfc3339() {
        let deadline = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let config = SystemConfig::new("https://example.com/b.png", Some(deadline));
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({
                "bannerUrl": "https://example.com/b.png",
                "voteDeadline": "2024-03-01T12:30:00Z",
            })
        );
        let back: SystemConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn malformed_deadline_is_rejected() {
        let result: Result<SystemConfig, _> =
            serde_json::from_value(json!({ "bannerUrl": "x", "voteDeadline": "soon" }));
        assert!(result.is_err());
    }
}
