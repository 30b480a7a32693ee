use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, voter::VoterProfile},
    common::AuditAction,
    db::{audit::AuditEntry, vote::Vote},
};

/// How many recent votes and registrations the dashboard shows.
pub const DASHBOARD_RECENT: usize = 10;

/// Site-wide activity for admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub total_elections: usize,
    pub active_elections: usize,
    pub total_voters: u64,
    pub total_votes: u64,
    pub recent_votes: Vec<RecentVote>,
    pub recent_registrations: Vec<VoterProfile>,
}

/// Who voted where and when. Which candidate is deliberately omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentVote {
    pub voter_id: ApiId,
    pub election_id: ApiId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for RecentVote {
    fn from(vote: Vote) -> Self {
        Self {
            voter_id: vote.voter_id.into(),
            election_id: vote.election_id.into(),
            cast_at: vote.cast_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntryDescription {
    pub id: ApiId,
    pub actor: Option<ApiId>,
    pub action: AuditAction,
    pub details: String,
    pub address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditEntry> for AuditEntryDescription {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id.into(),
            actor: entry.actor.map(ApiId::from),
            action: entry.action,
            address: entry.address.map(|a| a.to_string()),
            details: entry.entry.details,
            timestamp: entry.entry.timestamp,
        }
    }
}
