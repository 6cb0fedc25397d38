use serde_json::Value;
use tracing::warn;

use crate::{ids::ObjectId, models::AuditEntry, store::AuditSink};

/// Appends an audit entry. Failures are logged and swallowed; auditing never
/// fails the request that triggered it.
pub async fn log_audit<A>(
    sink: &A,
    user_id: Option<ObjectId>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) where
    A: AuditSink + ?Sized,
{
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
    };

    if let Err(err) = sink.append_audit(entry).await {
        warn!(error = %err, action, "audit log failed");
    }
}
