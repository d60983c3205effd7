//! crates/bookflow_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Apart from `Mood`, which travels over the wire as a lowercase tag, these
//! structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How the reader felt at the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Mood::Happy),
            "neutral" => Ok(Mood::Neutral),
            "sad" => Ok(Mood::Sad),
            other => Err(format!("unknown mood '{}'", other)),
        }
    }
}

/// A reading session row. `end_time == None` marks the session as active.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Final duration in seconds, set when the session ends.
    pub duration: Option<i32>,
    pub mood: Option<Mood>,
    pub key_insight: Option<String>,
    pub focus_mode: Option<bool>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A book in the user's catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    /// Cumulative reading time across all ended sessions, in seconds.
    pub total_reading_time: i64,
    pub created_at: DateTime<Utc>,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

//=========================================================================================
// Write Payloads
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub book_id: Uuid,
    pub focus_mode: Option<bool>,
}

/// A partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub mood: Option<Mood>,
    pub key_insight: Option<String>,
    pub focus_mode: Option<bool>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.mood.is_none() && self.key_insight.is_none() && self.focus_mode.is_none()
    }
}

/// Closes a session and credits `duration` seconds to its book.
#[derive(Debug, Clone)]
pub struct EndSession {
    pub duration: i32,
    pub mood: Option<Mood>,
    pub key_insight: Option<String>,
}
