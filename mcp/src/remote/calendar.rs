//! Calendar API helpers

use super::{array_field, ApiRequest, Backend, RemoteApi};
use crate::error::Result;
use serde_json::Value;

/// Filter for [`list_events`]
#[derive(Debug, Clone, Default)]
pub struct EventQuery<'a> {
    pub max_results: Option<u32>,
    pub time_min: Option<&'a str>,
    pub time_max: Option<&'a str>,
}

/// Single events of a calendar ordered by start time
pub async fn list_events(
    api: &dyn RemoteApi,
    calendar_id: &str,
    query: EventQuery<'_>,
) -> Result<Vec<Value>> {
    let response = api
        .call(
            ApiRequest::get(Backend::Calendar, ["calendars", calendar_id, "events"])
                .query("singleEvents", true)
                .query("orderBy", "startTime")
                .query_opt("maxResults", query.max_results)
                .query_opt("timeMin", query.time_min)
                .query_opt("timeMax", query.time_max),
        )
        .await?;

    Ok(array_field(&response, "items").to_vec())
}

/// Insert an event; `send_updates` controls invitation mail
pub async fn insert_event(
    api: &dyn RemoteApi,
    calendar_id: &str,
    event: Value,
    send_updates: Option<&str>,
) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Calendar, ["calendars", calendar_id, "events"])
            .query_opt("sendUpdates", send_updates)
            .json(event),
    )
    .await
}
