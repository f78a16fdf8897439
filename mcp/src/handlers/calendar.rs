//! Calendar handlers

use super::{gate, parse_args, require, validate_email, ToolOutcome};
use crate::context::McpServerContext;
use crate::error::{McpError, Result};
use crate::remote::calendar::{self, EventQuery};
use crate::remote::str_field;
use crate::server::confirmation::{evaluate, Preview, PreviewKind, Threshold, LONG_PREVIEW_LIMIT};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const PRIMARY_CALENDAR: &str = "primary";

fn default_calendar() -> String {
    PRIMARY_CALENDAR.to_string()
}

fn default_max_events() -> u32 {
    10
}

fn default_duration() -> i64 {
    30
}

fn default_max_slots() -> usize {
    5
}

#[derive(Debug, Deserialize)]
struct ListEventsArgs {
    #[serde(default = "default_calendar")]
    calendar_id: String,
    #[serde(default = "default_max_events")]
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct CreateEventArgs {
    summary: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct FreeSlotsArgs {
    #[serde(default = "default_calendar")]
    calendar_id: String,
    start_time: String,
    end_time: String,
    #[serde(default = "default_duration")]
    duration_minutes: i64,
    #[serde(default = "default_max_slots")]
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct CreateMeetingArgs {
    summary: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    confirm: bool,
}

/// A `[start, end)` interval
pub type Interval = (DateTime<Utc>, DateTime<Utc>);

/// Parse an RFC 3339 timestamp or an all-day `YYYY-MM-DD` date (midnight UTC)
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    if value.contains('T') {
        return DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

/// Busy interval of an event, from `dateTime` or all-day `date`
fn event_interval(event: &Value) -> Option<Interval> {
    let bound = |key: &str| {
        let time = event.get(key)?;
        let value = match str_field(time, "dateTime") {
            "" => str_field(time, "date"),
            value => value,
        };
        parse_time(value)
    };
    Some((bound("start")?, bound("end")?))
}

/// Gaps of at least `duration` between busy intervals inside the window
///
/// Intervals are swept in start order; a gap runs from the end of the
/// latest busy interval seen so far to the start of the next one. The
/// remainder of the window counts as a final gap.
pub fn free_slots(
    window: Interval,
    mut busy: Vec<Interval>,
    duration: Duration,
    max_results: usize,
) -> Vec<Interval> {
    let (window_start, window_end) = window;
    busy.sort_by_key(|(start, _)| *start);

    // overflow past the representable range never fits
    let fits = |from: DateTime<Utc>, to: DateTime<Utc>| {
        from.checked_add_signed(duration)
            .map_or(false, |until| until <= to)
    };

    let mut slots = Vec::new();
    let mut cursor = window_start;

    for (start, end) in busy {
        if slots.len() >= max_results {
            break;
        }
        if fits(cursor, start) {
            slots.push((cursor, start));
        }
        if end > cursor {
            cursor = end;
        }
    }

    if slots.len() < max_results && fits(cursor, window_end) {
        slots.push((cursor, window_end));
    }

    slots
}

/// Handle list_events tool
pub async fn handle_list(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ListEventsArgs = parse_args(args)?;

    let query = EventQuery {
        max_results: Some(args.max_results),
        ..EventQuery::default()
    };
    let events = calendar::list_events(ctx.api(), &args.calendar_id, query).await?;
    if events.is_empty() {
        return Ok(ToolOutcome::done("No upcoming events found."));
    }

    let mut output = String::from("Upcoming events:\n");
    for event in &events {
        let start = event.get("start").cloned().unwrap_or(Value::Null);
        let when = match str_field(&start, "dateTime") {
            "" => str_field(&start, "date"),
            when => when,
        };
        output.push_str(&format!(
            "- {} : {} (ID: {})\n",
            when,
            str_field(event, "summary"),
            str_field(event, "id")
        ));
    }
    Ok(ToolOutcome::done(output))
}

/// Handle create_event tool
pub async fn handle_create(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CreateEventArgs = parse_args(args)?;
    require("summary", &args.summary)?;
    require("start_time", &args.start_time)?;
    require("end_time", &args.end_time)?;

    let event = json!({
        "summary": args.summary,
        "description": args.description,
        "start": { "dateTime": args.start_time, "timeZone": "UTC" },
        "end": { "dateTime": args.end_time, "timeZone": "UTC" },
    });
    let created = calendar::insert_event(ctx.api(), PRIMARY_CALENDAR, event, None).await?;

    info!(event = str_field(&created, "id"), summary = %args.summary, "Event created");
    Ok(ToolOutcome::done(format!(
        "Event created: {}",
        str_field(&created, "htmlLink")
    )))
}

/// Handle calendar_find_free_slots tool
pub async fn handle_find_free_slots(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: FreeSlotsArgs = parse_args(args)?;
    require("calendar_id", &args.calendar_id)?;

    let (Some(start), Some(end)) = (parse_time(&args.start_time), parse_time(&args.end_time))
    else {
        return Err(McpError::InvalidInput(
            "Invalid start_time or end_time".to_string(),
        ));
    };
    if args.duration_minutes <= 0 {
        return Err(McpError::InvalidInput(
            "duration_minutes must be positive".to_string(),
        ));
    }
    let duration = Duration::try_minutes(args.duration_minutes).ok_or_else(|| {
        McpError::InvalidInput("duration_minutes is too large".to_string())
    })?;

    let query = EventQuery {
        max_results: None,
        time_min: Some(args.start_time.as_str()),
        time_max: Some(args.end_time.as_str()),
    };
    let events = calendar::list_events(ctx.api(), &args.calendar_id, query).await?;
    let busy: Vec<Interval> = events.iter().filter_map(event_interval).collect();

    let slots = free_slots(
        (start, end),
        busy,
        duration,
        args.max_results,
    );
    if slots.is_empty() {
        return Ok(ToolOutcome::done("No free slots found."));
    }

    let mut output = format!("Free slots (duration {} min):\n", args.duration_minutes);
    for (slot_start, slot_end) in &slots {
        output.push_str(&format!(
            "- {} to {}\n",
            slot_start.to_rfc3339(),
            slot_end.to_rfc3339()
        ));
    }

    info!(calendar = %args.calendar_id, slots = slots.len(), "Free slots found");
    Ok(ToolOutcome::done(output))
}

/// Handle calendar_create_meeting tool
///
/// Invalid attendee addresses are dropped; invitations go to everyone left.
pub async fn handle_create_meeting(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CreateMeetingArgs = parse_args(args)?;
    require("summary", &args.summary)?;
    require("start_time", &args.start_time)?;
    require("end_time", &args.end_time)?;

    let (valid, invalid): (Vec<&String>, Vec<&String>) =
        args.attendees.iter().partition(|a| validate_email(a));

    let decision = evaluate(valid.len() as u64, args.confirm, Threshold::Always, || {
        let mut preview = Preview::new(
            PreviewKind::ConfirmationRequired,
            "This will create a calendar event and invite attendees",
            "calendar_create_meeting",
            "confirm",
            true,
        )
        .fact("Summary", args.summary.clone())
        .fact("Start", args.start_time.clone())
        .fact("End", args.end_time.clone())
        .samples(valid.iter().map(|a| a.to_string()), LONG_PREVIEW_LIMIT);
        if !invalid.is_empty() {
            preview = preview.warning(format!(
                "Invalid attendee addresses will be skipped: {}",
                invalid
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        preview
    });
    if let Err(blocked) = gate(decision) {
        warn!(summary = %args.summary, attendees = valid.len(), "Meeting creation without confirm");
        return Ok(blocked);
    }

    let mut event = json!({
        "summary": args.summary,
        "description": args.description,
        "location": args.location,
        "start": { "dateTime": args.start_time, "timeZone": "UTC" },
        "end": { "dateTime": args.end_time, "timeZone": "UTC" },
    });
    if !args.attendees.is_empty() {
        event["attendees"] = valid.iter().map(|a| json!({ "email": a })).collect();
    }

    let created = calendar::insert_event(ctx.api(), PRIMARY_CALENDAR, event, Some("all")).await?;

    info!(
        event = str_field(&created, "id"),
        attendees = valid.len(),
        skipped = invalid.len(),
        "Meeting created"
    );
    Ok(ToolOutcome::done(format!(
        "Meeting created: {}",
        str_field(&created, "htmlLink")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            at("2024-03-01T10:00:00Z"),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            at("2024-03-01T12:00:00+02:00"),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            at("2024-03-01"),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_time("tomorrow").is_none());
    }

    #[test]
    fn test_free_slots_between_events() {
        let window = (at("2024-03-01T09:00:00Z"), at("2024-03-01T17:00:00Z"));
        let busy = vec![
            (at("2024-03-01T13:00:00Z"), at("2024-03-01T14:00:00Z")),
            (at("2024-03-01T09:00:00Z"), at("2024-03-01T10:00:00Z")),
            (at("2024-03-01T10:10:00Z"), at("2024-03-01T11:00:00Z")),
        ];

        let slots = free_slots(window, busy, Duration::minutes(30), 5);
        assert_eq!(
            slots,
            vec![
                (at("2024-03-01T11:00:00Z"), at("2024-03-01T13:00:00Z")),
                (at("2024-03-01T14:00:00Z"), at("2024-03-01T17:00:00Z")),
            ]
        );
    }

    #[test]
    fn test_free_slots_overlapping_events() {
        let window = (at("2024-03-01T09:00:00Z"), at("2024-03-01T12:00:00Z"));
        let busy = vec![
            (at("2024-03-01T09:30:00Z"), at("2024-03-01T11:00:00Z")),
            (at("2024-03-01T10:00:00Z"), at("2024-03-01T10:30:00Z")),
        ];

        let slots = free_slots(window, busy, Duration::minutes(30), 5);
        assert_eq!(
            slots,
            vec![
                (at("2024-03-01T09:00:00Z"), at("2024-03-01T09:30:00Z")),
                (at("2024-03-01T11:00:00Z"), at("2024-03-01T12:00:00Z")),
            ]
        );
    }

    #[test]
    fn test_free_slots_respects_max_results() {
        let window = (at("2024-03-01T08:00:00Z"), at("2024-03-01T18:00:00Z"));
        let busy = vec![
            (at("2024-03-01T09:00:00Z"), at("2024-03-01T10:00:00Z")),
            (at("2024-03-01T11:00:00Z"), at("2024-03-01T12:00:00Z")),
        ];

        let slots = free_slots(window, busy, Duration::minutes(30), 1);
        assert_eq!(
            slots,
            vec![(at("2024-03-01T08:00:00Z"), at("2024-03-01T09:00:00Z"))]
        );
    }

    #[test]
    fn test_fully_booked_window() {
        let window = (at("2024-03-01T09:00:00Z"), at("2024-03-01T10:00:00Z"));
        let busy = vec![(at("2024-03-01T08:00:00Z"), at("2024-03-01T10:00:00Z"))];
        assert!(free_slots(window, busy, Duration::minutes(15), 5).is_empty());
    }

    #[test]
    fn test_free_slots_duration_beyond_calendar_range() {
        let window = (at("2024-03-01T09:00:00Z"), at("2024-03-01T17:00:00Z"));
        let busy = vec![(at("2024-03-01T12:00:00Z"), at("2024-03-01T13:00:00Z"))];

        let huge = Duration::try_minutes(1_000_000_000_000).unwrap();
        assert!(free_slots(window, busy, huge, 5).is_empty());
    }

    #[test]
    fn test_unrepresentable_duration() {
        assert!(Duration::try_minutes(i64::MAX).is_none());
    }

    #[test]
    fn test_event_interval_all_day() {
        let event = json!({"start": {"date": "2024-03-01"}, "end": {"date": "2024-03-02"}});
        assert_eq!(
            event_interval(&event),
            Some((at("2024-03-01T00:00:00Z"), at("2024-03-02T00:00:00Z")))
        );
    }
}
