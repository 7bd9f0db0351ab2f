//! Template filters shared by every page.

use std::fmt::Display;

use crate::schedule::{display_timestamp, input_timestamp};

pub fn status_label<T: Display>(status: T) -> ::askama::Result<String> {
    let label = match status.to_string().as_str() {
        "scheduled" => "Scheduled",
        "in_progress" => "In progress",
        "completed" => "Completed",
        "cancelled" => "Cancelled",
        other => return Ok(other.to_string()),
    };
    Ok(label.to_string())
}

/// CSS modifier for the status badge.
pub fn status_class<T: Display>(status: T) -> ::askama::Result<String> {
    Ok(format!("badge-{}", status.to_string().replace('_', "-")))
}

pub fn datetime<T: Display>(value: T) -> ::askama::Result<String> {
    Ok(display_timestamp(&value.to_string()))
}

/// `YYYY-MM-DDTHH:MM` for `datetime-local` inputs.
pub fn datetime_input<T: Display>(value: T) -> ::askama::Result<String> {
    Ok(input_timestamp(&value.to_string()))
}

/// `bi_weekly` becomes `Bi weekly`.
pub fn humanize<T: Display>(value: T) -> ::askama::Result<String> {
    let text = value.to_string().replace('_', " ");
    let mut chars = text.chars();
    Ok(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    })
}
