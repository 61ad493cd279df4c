//! Hook handlers of the time clock plugin.

use std::sync::Arc;

use fieldops_plugin_sdk::prelude::*;
use tracing::debug;

use crate::service;

/// Adds `timeClock.loggedMinutes` to completed tickets that carry an `id`.
pub fn ticket_completed(data: Arc<dyn TenantDataAccess>) -> HookBinding {
    hook(events::TICKET_COMPLETED, move |mut ticket: Value| {
        let data = data.clone();
        async move {
            let Some(ticket_id) = ticket_id(&ticket) else {
                return Ok(ticket);
            };
            let minutes = service::minutes_for_ticket(data.as_ref(), &ticket_id).await?;
            debug!(ticket = %ticket_id, minutes, "Annotating completed ticket");
            if let Some(fields) = ticket.as_object_mut() {
                fields.insert("timeClock".into(), json!({ "loggedMinutes": minutes }));
            }
            Ok(ticket)
        }
    })
}

fn ticket_id(ticket: &Value) -> Option<String> {
    match ticket.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
