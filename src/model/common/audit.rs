use serde::{Deserialize, Serialize};

/// Kinds of event recorded in the audit log.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    VoteCast,
    ElectionCreated,
    ElectionUpdated,
    ElectionDeleted,
    CandidateAdded,
    CandidateDeleted,
    VoterRegistered,
    VoterEligibilityChanged,
    ProfileUpdated,
    AdminCreated,
    AdminDeleted,
}
