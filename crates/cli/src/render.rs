//! Plain-text rendering of normalized entities.

use chrono::{DateTime, Utc};
use volunteer_core::{Comment, Entity, Event, MediaKind, Post};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;

/// Short relative form of an RFC 3339 timestamp (`5m ago`, `in 3d`).
///
/// Unparseable input is returned unchanged; anything older than a month is
/// shown as a date.
pub fn relative_time(raw: &str, now: DateTime<Utc>) -> String {
    let Ok(at) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };
    let seconds = now.signed_duration_since(at.with_timezone(&Utc)).num_seconds();
    let (elapsed, future) = (seconds.abs(), seconds < 0);

    let span = match elapsed {
        s if s < MINUTE => return "just now".to_string(),
        s if s < HOUR => format!("{}m", s / MINUTE),
        s if s < DAY => format!("{}h", s / HOUR),
        s if s < MONTH => format!("{}d", s / DAY),
        _ => return at.format("%Y-%m-%d").to_string(),
    };
    if future { format!("in {span}") } else { format!("{span} ago") }
}

fn author(entity: &Entity) -> &str {
    if entity.author.display_name.is_empty() {
        "unknown"
    } else {
        &entity.author.display_name
    }
}

fn media_summary(entity: &Entity) -> Option<String> {
    if entity.media.is_empty() {
        return None;
    }
    let videos = entity
        .media
        .iter()
        .filter(|m| m.kind == MediaKind::Video)
        .count();
    let images = entity.media.len() - videos;
    Some(format!("[{images} image(s), {videos} video(s)]"))
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Feed entry: header line, then the indented content.
pub fn post(post: &Post, now: DateTime<Utc>) -> String {
    let entity = &post.entity;
    let mut out = format!(
        "#{} {} · {} · {} like(s){} · {} comment(s)",
        entity.id,
        author(entity),
        relative_time(&entity.created_at, now),
        entity.counters.like_count,
        if entity.viewer_state.liked { " (you)" } else { "" },
        entity.counters.comment_count,
    );
    if !entity.content.is_empty() {
        out.push('\n');
        out.push_str(&indent(&entity.content, "    "));
    }
    if let Some(media) = media_summary(entity) {
        out.push_str("\n    ");
        out.push_str(&media);
    }
    out
}

/// Event entry: title, schedule, place and registration status.
pub fn event(event: &Event, now: DateTime<Utc>) -> String {
    let seats = match event.capacity {
        Some(capacity) => format!("{}/{capacity} registered", event.registration_count),
        None => format!("{} registered", event.registration_count),
    };
    let mut out = format!("#{} {} · {seats}", event.entity.id, event.title);
    if event.registered {
        out.push_str(" (you)");
    } else if event.is_full() {
        out.push_str(" (full)");
    }
    if let Some(starts_at) = &event.starts_at {
        out.push_str(&format!("\n    starts {}", relative_time(starts_at, now)));
    }
    if let Some(location) = &event.location {
        out.push_str(&format!("\n    at {location}"));
    }
    out
}

/// One comment line, indented by its depth in the thread.
pub fn comment(depth: usize, comment: &Comment, now: DateTime<Utc>) -> String {
    let prefix = "  ".repeat(depth);
    let entity = &comment.entity;
    let content = entity.content.replace('\n', " ");
    match relative_time(&entity.created_at, now) {
        when if when.is_empty() => format!("{prefix}{}: {content}", author(entity)),
        when => format!("{prefix}{} ({when}): {content}", author(entity)),
    }
}
