use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result};

use super::ledger::{normalize_email, VoterRecord};

/// The administrator address used when none is configured.
pub const DEFAULT_ADMIN_EMAIL: &str = "jirutthawat.u@ditc.co.th";

/// The email domain ordinary voters must belong to when none is configured.
pub const DEFAULT_EMAIL_DOMAIN: &str = "gmail.com";

/// A logged-in user. Rebuilt from the ledger on every login; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub is_admin: bool,
    #[serde(flatten)]
    pub record: VoterRecord,
}

/// Decides who may log in and who is an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPolicy {
    admin_emails: HashSet<String>,
    allowed_domain: String,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self::new([DEFAULT_ADMIN_EMAIL], DEFAULT_EMAIL_DOMAIN)
    }
}

impl LoginPolicy {
    pub fn new<I, S>(admin_emails: I, allowed_domain: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|email| normalize_email(email.as_ref()))
                .collect(),
            allowed_domain: allowed_domain.trim().trim_start_matches('@').to_lowercase(),
        }
    }

    /// The domain every non-admin voter's email must belong to.
    pub fn allowed_domain(&self) -> &str {
        &self.allowed_domain
    }

    pub fn admin_count(&self) -> usize {
        self.admin_emails.len()
    }

    /// Exact match only; no patterns.
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(email)
    }

    /// Normalize the given email and check it may log in.
    ///
    /// Returns the normalized email and whether it belongs to an admin.
    pub fn admit(&self, email: &str) -> Result<(String, bool)> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::BadRequest("Please enter an email address".to_string()));
        }
        if self.is_admin(&email) {
            return Ok((email, true));
        }
        let suffix = format!("@{}", self.allowed_domain);
        if email.len() > suffix.len() && email.ends_with(&suffix) {
            Ok((email, false))
        } else {
            Err(Error::Unauthorized(format!("Only {suffix} accounts may vote")))
        }
    }
}
