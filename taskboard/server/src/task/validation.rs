//! Parsing and validation of task request bodies.
//!
//! Create and update share the same body and the same rules. Dates may be
//! given as RFC 3339 timestamps, as naive `YYYY-MM-DDTHH:MM:SS` timestamps
//! (read as UTC) or as plain `YYYY-MM-DD` dates (midnight UTC). Missing,
//! `null` and empty-string dates all count as absent.

use super::{TaskSchedule, TaskServiceError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

/// Body of a create or update request, before validation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct TaskDraft {
    /// Title of the task. Surrounding whitespace is trimmed.
    #[serde(default)]
    pub title: Option<String>,
    /// Free-form description. On update, sending `null` or `""` clears it and
    /// leaving the field out keeps the stored value.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    /// Start of the task. Must be given together with `end`.
    #[serde(default)]
    pub start: Option<String>,
    /// End of the task. Must be given together with `start`.
    #[serde(default)]
    pub end: Option<String>,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: String,
    /// `None` when the body did not mention the description at all.
    pub description: Option<Option<String>>,
    pub schedule: Option<TaskSchedule>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validates a draft, checking the title first and the date pair second.
pub fn validate(draft: TaskDraft) -> Result<TaskChanges, TaskServiceError> {
    let title = draft
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .ok_or(TaskServiceError::MissingTitle)?
        .to_string();

    let start = draft.start.as_deref().filter(|raw| !raw.is_empty());
    let end = draft.end.as_deref().filter(|raw| !raw.is_empty());

    let schedule = match (start, end) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(TaskSchedule::new(parse_date(start)?, parse_date(end)?)?),
        _ => return Err(TaskServiceError::EitherBothDatesOrNone),
    };

    Ok(TaskChanges {
        title,
        description: draft.description,
        schedule,
    })
}

/// Parses a date the way clients send them.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, TaskServiceError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TaskServiceError::InvalidDate(raw.to_string()))
}
