use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::{AccountId, InviteId};

/// Lifecycle of an invite: `Pending` moves to exactly one of the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InviteStatus {
    Pending,
    Accepted,
    Expired,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "expired" => Ok(InviteStatus::Expired),
            _ => Err(ModelError::UnknownInviteStatus(s.to_string())),
        }
    }
}

/// Referral sent by an existing account to a not-yet-registered email.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Invite {
    pub id: InviteId,
    pub inviter_id: AccountId,
    /// Normalized (trimmed, lowercase) invitee email.
    pub invitee_email: String,
    /// Human-friendly code handed to the invitee.
    pub code: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invite {
    /// True once `now` is strictly past `expires_at`.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Pending and still inside its validity window.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Pending && !self.is_past_expiry(now)
    }
}
