//! Clock-in/clock-out bookkeeping over the tenant data handle.

use chrono::{DateTime, Utc};

use fieldops_plugin::{PluginError, TenantDataAccess};

use crate::config::TimeClockConfig;
use crate::models::{ClockInRequest, ClockOutRequest, ENTRIES_COLLECTION, EntryKind, TimeEntry};

/// Outcome of a clock operation that can be refused.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockResult {
    /// The entry was stored.
    Recorded(TimeEntry),
    /// The request contradicts the technician's current state.
    Rejected(String),
}

/// All entries, optionally for one technician, oldest first.
pub async fn entries(
    data: &dyn TenantDataAccess,
    user_id: Option<&str>,
) -> Result<Vec<TimeEntry>, PluginError> {
    let docs = data.list_documents(ENTRIES_COLLECTION).await?;
    let mut entries = Vec::with_capacity(docs.len());
    for doc in docs {
        let entry: TimeEntry = serde_json::from_value(doc.body)?;
        if user_id.is_none_or(|u| u == entry.user_id) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Open clock-in of `user_id`, if the last event is a clock-in.
pub async fn open_shift(
    data: &dyn TenantDataAccess,
    user_id: &str,
) -> Result<Option<TimeEntry>, PluginError> {
    let last = entries(data, Some(user_id)).await?.pop();
    Ok(last.filter(|e| e.kind == EntryKind::ClockIn))
}

/// Records a clock-in.
pub async fn clock_in(
    data: &dyn TenantDataAccess,
    config: &TimeClockConfig,
    request: ClockInRequest,
    now: DateTime<Utc>,
) -> Result<ClockResult, PluginError> {
    if request.user_id.trim().is_empty() {
        return Ok(ClockResult::Rejected("userId is required".into()));
    }
    if config.require_ticket && request.ticket_id.is_none() {
        return Ok(ClockResult::Rejected("ticketId is required".into()));
    }
    if open_shift(data, &request.user_id).await?.is_some() {
        return Ok(ClockResult::Rejected(format!(
            "{} is already clocked in",
            request.user_id
        )));
    }

    let entry = TimeEntry {
        user_id: request.user_id,
        kind: EntryKind::ClockIn,
        at: now,
        ticket_id: request.ticket_id,
        note: request.note,
        minutes: None,
    };
    data.insert_document(ENTRIES_COLLECTION, serde_json::to_value(&entry)?)
        .await?;
    Ok(ClockResult::Recorded(entry))
}

/// Records a clock-out closing the open shift.
pub async fn clock_out(
    data: &dyn TenantDataAccess,
    config: &TimeClockConfig,
    request: ClockOutRequest,
    now: DateTime<Utc>,
) -> Result<ClockResult, PluginError> {
    let Some(open) = open_shift(data, &request.user_id).await? else {
        return Ok(ClockResult::Rejected(format!(
            "{} is not clocked in",
            request.user_id
        )));
    };

    let worked = (now - open.at).num_minutes().max(0);
    let entry = TimeEntry {
        user_id: request.user_id,
        kind: EntryKind::ClockOut,
        at: now,
        ticket_id: open.ticket_id,
        note: request.note,
        minutes: Some(round_up(worked, config.rounding_minutes)),
    };
    data.insert_document(ENTRIES_COLLECTION, serde_json::to_value(&entry)?)
        .await?;
    Ok(ClockResult::Recorded(entry))
}

/// Minutes logged against `ticket_id` by completed shifts.
pub async fn minutes_for_ticket(
    data: &dyn TenantDataAccess,
    ticket_id: &str,
) -> Result<i64, PluginError> {
    Ok(entries(data, None)
        .await?
        .iter()
        .filter(|e| e.kind == EntryKind::ClockOut && e.ticket_id.as_deref() == Some(ticket_id))
        .filter_map(|e| e.minutes)
        .sum())
}

/// Rounds `minutes` up to a multiple of `step`.
pub fn round_up(minutes: i64, step: u32) -> i64 {
    if step == 0 {
        return minutes;
    }
    let step = i64::from(step);
    (minutes + step - 1) / step * step
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use fieldops_core::TenantId;
    use fieldops_plugin::TenantDataProvider;
    use fieldops_plugin::api::MemoryDataProvider;

    use super::*;

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(7, 0), 7);
        assert_eq!(round_up(7, 15), 15);
        assert_eq!(round_up(15, 15), 15);
        assert_eq!(round_up(0, 15), 0);
    }

    #[tokio::test]
    async fn test_shift_logs_minutes_against_ticket() {
        let data = MemoryDataProvider::new().for_tenant(&TenantId::parse("T1").unwrap());
        let config = TimeClockConfig {
            rounding_minutes: 15,
            require_ticket: false,
        };
        let start = Utc::now();

        let first = clock_in(
            data.as_ref(),
            &config,
            ClockInRequest {
                user_id: "tech-1".into(),
                ticket_id: Some("TK-9".into()),
                note: None,
            },
            start,
        )
        .await
        .unwrap();
        assert!(matches!(first, ClockResult::Recorded(_)));

        let twice = clock_in(
            data.as_ref(),
            &config,
            ClockInRequest {
                user_id: "tech-1".into(),
                ticket_id: None,
                note: None,
            },
            start,
        )
        .await
        .unwrap();
        assert!(matches!(twice, ClockResult::Rejected(_)));

        let out = clock_out(
            data.as_ref(),
            &config,
            ClockOutRequest {
                user_id: "tech-1".into(),
                note: Some("done".into()),
            },
            start + Duration::minutes(40),
        )
        .await
        .unwrap();
        match out {
            ClockResult::Recorded(entry) => assert_eq!(entry.minutes, Some(45)),
            ClockResult::Rejected(reason) => panic!("rejected: {reason}"),
        }

        assert_eq!(minutes_for_ticket(data.as_ref(), "TK-9").await.unwrap(), 45);
        assert_eq!(entries(data.as_ref(), Some("tech-1")).await.unwrap().len(), 2);
        assert!(open_shift(data.as_ref(), "tech-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clock_out_without_shift_is_rejected() {
        let data = MemoryDataProvider::new().for_tenant(&TenantId::parse("T1").unwrap());
        let out = clock_out(
            data.as_ref(),
            &TimeClockConfig::default(),
            ClockOutRequest {
                user_id: "tech-2".into(),
                note: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(out, ClockResult::Rejected("tech-2 is not clocked in".into()));
    }
}
