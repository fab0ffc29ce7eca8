//! Core credential types.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The current UTC calendar day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A provider secret and the UTC day it was acquired.
///
/// Serialized as `{"date": "YYYY-MM-DD", "secret": "..."}`. Records are
/// never mutated; a refresh replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub date: NaiveDate,
    pub secret: String,
}

impl CredentialRecord {
    pub fn new<S: Into<String>>(secret: S, date: NaiveDate) -> Self {
        Self {
            date,
            secret: secret.into(),
        }
    }

    /// A record acquired now.
    pub fn acquired_today<S: Into<String>>(secret: S) -> Self {
        Self::new(secret, today())
    }

    /// Usable only on the day it was acquired.
    #[inline]
    pub fn is_fresh_on(&self, day: NaiveDate) -> bool {
        self.date == day
    }

    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_on(today())
    }
}
