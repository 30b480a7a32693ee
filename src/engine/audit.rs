//! Best-effort writes to the audit log.

use std::net::IpAddr;

use chrono::Utc;
use log::warn;

use crate::model::{common::AuditAction, db::audit::NewAuditEntry, mongodb::Id};
use crate::store::AuditStore;

/// Append an audit entry. Failures are logged and otherwise ignored: the
/// action being audited has already happened and must not be reported as
/// failed.
pub async fn record<S>(
    store: &S,
    actor: Option<Id>,
    action: AuditAction,
    details: impl Into<String>,
    address: Option<IpAddr>,
) where
    S: AuditStore + ?Sized,
{
    let entry = NewAuditEntry {
        actor,
        action,
        details: details.into(),
        address,
        timestamp: Utc::now(),
    };
    if let Err(e) = store.append_audit(entry).await {
        warn!("Failed to record audit entry for {action:?}: {e}");
    }
}
