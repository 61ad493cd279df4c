//! HTTP routes served under `/api/plugins/time-clock`.

use std::sync::Arc;

use chrono::Utc;

use fieldops_plugin_sdk::prelude::*;

use crate::config::TimeClockConfig;
use crate::models::{ClockInRequest, ClockOutRequest};
use crate::service::{self, ClockResult};

/// Routes of the time clock plugin.
pub fn routes(config: Arc<TimeClockConfig>) -> Vec<PluginRoute> {
    let settings = config.clone();
    let clock_in_config = config.clone();
    let clock_out_config = config;

    vec![
        get("/", move |_req| {
            let settings = settings.clone();
            async move { Ok(ok(serde_json::to_value(settings.as_ref())?)) }
        }),
        post("/clock-in", move |req| {
            let config = clock_in_config.clone();
            async move {
                let body: ClockInRequest = body_as(&req)?;
                let result = service::clock_in(req.data.as_ref(), &config, body, Utc::now()).await?;
                respond(result)
            }
        }),
        post("/clock-out", move |req| {
            let config = clock_out_config.clone();
            async move {
                let body: ClockOutRequest = body_as(&req)?;
                let result =
                    service::clock_out(req.data.as_ref(), &config, body, Utc::now()).await?;
                respond(result)
            }
        }),
        get("/entries", |req| async move {
            let entries = service::entries(req.data.as_ref(), req.query_param("userId")).await?;
            Ok(ok(serde_json::to_value(entries)?))
        }),
    ]
}

fn respond(result: ClockResult) -> Result<PluginResponse, PluginError> {
    match result {
        ClockResult::Recorded(entry) => Ok(created(serde_json::to_value(&entry)?)),
        ClockResult::Rejected(reason) => Ok(PluginResponse::new(
            StatusCode::CONFLICT,
            json!({ "error": "CONFLICT", "message": reason }),
        )),
    }
}
