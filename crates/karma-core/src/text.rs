use time::{Duration, OffsetDateTime};

const ZERO_WIDTH_SPACE: char = '\u{200b}';

#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Collapses whitespace runs so a message fits on one log line.
#[must_use]
pub fn sanitize_line(s: &str, max: usize) -> String {
    let compact = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&compact, max)
}

/// Inserts a zero-width space after the first character so that echoing a
/// name back into the channel does not notify its owner.
#[must_use]
pub fn munge(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        let mut out = String::with_capacity(name.len() + ZERO_WIDTH_SPACE.len_utf8());
        out.push(first);
        out.push(ZERO_WIDTH_SPACE);
        out.push_str(chars.as_str());
        out
    })
}

/// Relative time such as `3 days ago`.
#[must_use]
pub fn humanize_ago(then: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed = now - then;
    if elapsed < Duration::SECOND {
        return "now".to_owned();
    }
    let units = [
        (Duration::days(365), "year"),
        (Duration::days(30), "month"),
        (Duration::WEEK, "week"),
        (Duration::DAY, "day"),
        (Duration::HOUR, "hour"),
        (Duration::MINUTE, "minute"),
        (Duration::SECOND, "second"),
    ];
    for (unit, name) in units {
        if elapsed >= unit {
            let count = elapsed.whole_seconds() / unit.whole_seconds();
            return if count == 1 {
                format!("1 {name} ago")
            } else {
                format!("{count} {name}s ago")
            };
        }
    }
    "now".to_owned()
}
