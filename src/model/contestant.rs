use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contestant and their running vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contestant {
    /// Opaque identity, unique within a backend.
    pub id: String,
    /// Display number, e.g. "01". Kept as text so leading zeroes survive.
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub votes: u64,
}

/// Contestant details as entered by an administrator, before an ID is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContestant {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub image_url: String,
}

impl NewContestant {
    /// Trim the text fields and check the ones that must be present.
    pub fn validated(self) -> Result<Self, String> {
        let new = Self {
            number: self.number.trim().to_string(),
            name: self.name.trim().to_string(),
            department: self.department.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
        };
        if new.number.is_empty() {
            return Err("Contestant number must not be empty".to_string());
        }
        if new.name.is_empty() {
            return Err("Contestant name must not be empty".to_string());
        }
        Ok(new)
    }

    /// Turn into a full contestant with a fresh ID and no votes.
    pub fn into_contestant(self, now: DateTime<Utc>) -> Contestant {
        Contestant {
            id: next_contestant_id(now),
            number: self.number,
            name: self.name,
            department: self.department,
            image_url: self.image_url,
            votes: 0,
        }
    }
}

/// Generate a timestamp-derived contestant ID.
///
/// IDs are the creation time in milliseconds, bumped forward when needed so
/// that two contestants created within the same millisecond never collide.
pub fn next_contestant_id(now: DateTime<Utc>) -> String {
    static LAST_ID: AtomicI64 = AtomicI64::new(0);

    let candidate = now.timestamp_millis();
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = candidate.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(actual) => last = actual,
        }
    }
}

/// The contestants a fresh local store starts out with.
pub fn seed_contestants() -> Vec<Contestant> {
    vec![
        Contestant {
            id: "1".to_string(),
            number: "01".to_string(),
            name: "สมชาย ใจดี".to_string(),
            department: "แผนก IT / บริษัท เทควัน".to_string(),
            image_url: "https://picsum.photos/seed/p1/400/600".to_string(),
            votes: 12,
        },
        Contestant {
            id: "2".to_string(),
            number: "02".to_string(),
            name: "มารี สวยงาม".to_string(),
            department: "ฝ่ายการตลาด (สนง.ใหญ่)".to_string(),
            image_url: "https://picsum.photos/seed/p2/400/600".to_string(),
            votes: 25,
        },
        Contestant {
            id: "3".to_string(),
            number: "03".to_string(),
            name: "กานดา น่ารัก".to_string(),
            department: "บจก. เอแอนด์บี กรุ๊ป".to_string(),
            image_url: "https://picsum.photos/seed/p3/400/600".to_string(),
            votes: 8,
        },
    ]
}
