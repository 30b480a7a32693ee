use std::net::IpAddr;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::AuditAction, mongodb::Id};

/// A security-relevant event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntryCore {
    /// The acting voter or admin, if any.
    pub actor: Option<Id>,
    pub action: AuditAction,
    pub details: String,
    pub address: Option<IpAddr>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

/// An audit entry without an ID.
pub type NewAuditEntry = AuditEntryCore;

/// An audit entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: AuditEntryCore,
}

impl Deref for AuditEntry {
    type Target = AuditEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
