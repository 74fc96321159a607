//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque connection handle identifying a participant
pub type ParticipantId = String;

/// Unique identifier for a two-party session
pub type SessionId = Uuid;

/// Whether a participant wants to be matched inside their own region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScopePreference {
    SameCountry,
    #[default]
    AnyCountry,
}

impl ScopePreference {
    /// Parse the `preference` query parameter. Anything unknown means any region.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("same-country") => ScopePreference::SameCountry,
            _ => ScopePreference::AnyCountry,
        }
    }
}

/// Kind of session a participant is queued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Text,
    Video,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Text => "text",
            SessionKind::Video => "video",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-declared category of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    PreferNotToSay,
}

impl Gender {
    /// Parse a query value, unknown values are treated as undeclared
    pub fn from_query(value: Option<&str>) -> Option<Self> {
        match value? {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "non-binary" => Some(Gender::NonBinary),
            "prefer-not-to-say" => Some(Gender::PreferNotToSay),
            _ => None,
        }
    }

    /// Whether this is one of the two binary categories
    pub fn is_binary(&self) -> bool {
        matches!(self, Gender::Male | Gender::Female)
    }
}

/// Which declared categories a participant is willing to be paired with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenderPreference {
    Male,
    Female,
    /// Either of the two binary categories
    Both,
    /// Wildcard
    Any,
}

impl GenderPreference {
    pub fn from_query(value: Option<&str>) -> Option<Self> {
        match value? {
            "male" => Some(GenderPreference::Male),
            "female" => Some(GenderPreference::Female),
            "both" => Some(GenderPreference::Both),
            "any" => Some(GenderPreference::Any),
            _ => None,
        }
    }
}

/// Scope half of a pool key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    Global,
    Region(String),
}

/// Composite key of a waiting pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub scope: ScopeKey,
    pub kind: SessionKind,
}

impl PoolKey {
    pub fn global(kind: SessionKind) -> Self {
        Self {
            scope: ScopeKey::Global,
            kind,
        }
    }

    pub fn region(country_code: impl Into<String>, kind: SessionKind) -> Self {
        Self {
            scope: ScopeKey::Region(country_code.into()),
            kind,
        }
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            ScopeKey::Global => write!(f, "global-{}", self.kind),
            ScopeKey::Region(code) => write!(f, "{}-{}", code, self.kind),
        }
    }
}

/// A connected visitor with resolved preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub country_code: String,
    pub preference: ScopePreference,
    pub kind: SessionKind,
    pub gender: Option<Gender>,
    pub gender_preference: Option<GenderPreference>,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// The pool this participant belongs in given its scope preference
    pub fn pool_key(&self) -> PoolKey {
        match self.preference {
            ScopePreference::SameCountry => PoolKey::region(self.country_code.clone(), self.kind),
            ScopePreference::AnyCountry => PoolKey::global(self.kind),
        }
    }
}

/// Reason a participant left a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveReason {
    Next,
    Disconnect,
}

impl LeaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Next => "next",
            LeaveReason::Disconnect => "disconnect",
        }
    }
}
