//! Per-message classification: the pure half of command dispatch.

use std::borrow::Cow;

use crate::{
    extract::parse_operation,
    grammar::{Grammar, Head},
    model::ParsedCommand,
};

pub const MOTIVATE_REASON: &str = "doing good work";

/// Result of the motivate pre-processing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite<'a> {
    pub text: Cow<'a, str>,
    pub rewritten: bool,
}

/// Turns `!m user` / `?m user` into `user++ for doing good work`.
///
/// The event text itself is left alone; callers parse the returned text.
#[must_use]
pub fn rewrite_motivate<'a>(grammar: &Grammar, text: &'a str) -> Rewrite<'a> {
    match grammar.parse_motivate(text) {
        Some(ParsedCommand::Motivate { user_token }) => Rewrite {
            text: Cow::Owned(format!("{user_token}++ for {MOTIVATE_REASON}")),
            rewritten: true,
        },
        _ => Rewrite {
            text: Cow::Borrowed(text),
            rewritten: false,
        },
    }
}

/// Everything recognized in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub text: String,
    pub rewritten: bool,
    pub commands: Vec<ParsedCommand>,
}

impl Classification {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Classifies a message in a single pass.
///
/// Every mention followed by `++`/`--` is its own fragment, wherever it
/// sits. A bare `name++` only counts when nothing but a ` for <reason>`
/// follows it on its line. A reason runs to the end of its line or to the
/// next mention fragment, and nothing inside it starts an operation.
///
/// A mention without an operator falls back to a whole-message throwback or
/// query, evaluated once. A message with no fragments at all is matched as
/// a whole against leaderboard, url, query and throwback; the first hit wins.
#[must_use]
pub fn classify(grammar: &Grammar, text: &str, motivate: bool) -> Classification {
    let trimmed = text.trim();
    let rewrite = if motivate {
        rewrite_motivate(grammar, trimmed)
    } else {
        Rewrite {
            text: Cow::Borrowed(trimmed),
            rewritten: false,
        }
    };
    let text = rewrite.text.as_ref();

    let heads = grammar.heads(text);
    let mut commands = Vec::new();
    let mut found = false;
    let mut unclaimed = false;
    let mut reason_end = 0;

    for (idx, head) in heads.iter().enumerate() {
        if head.start < reason_end {
            continue;
        }
        let end = rest_end(text, head.end, &heads[idx + 1..]);
        let rest = &text[head.end..end];
        let opens_reason = grammar.opens_reason(rest);
        if !head.mention && !opens_reason && !rest.trim().is_empty() {
            continue;
        }
        found = true;
        if !head.has_operator {
            unclaimed = true;
            continue;
        }
        let fragment = if opens_reason {
            reason_end = end;
            Cow::Owned(format!("{}{}", &text[head.start..head.end], rest.trim_end()))
        } else {
            Cow::Borrowed(&text[head.start..head.end])
        };
        match parse_operation(grammar, &fragment) {
            Some(command) => commands.push(command),
            None => unclaimed = true,
        }
    }

    if found {
        if unclaimed {
            commands.extend(
                grammar
                    .parse_throwback(text)
                    .or_else(|| grammar.parse_query(text)),
            );
        }
    } else {
        commands.extend(
            grammar
                .parse_leaderboard(text)
                .or_else(|| grammar.parse_url(text))
                .or_else(|| grammar.parse_query(text))
                .or_else(|| grammar.parse_throwback(text)),
        );
    }

    Classification {
        text: text.to_owned(),
        rewritten: rewrite.rewritten,
        commands,
    }
}

/// End of the text that belongs to a head ending at `from`: the first line
/// break or the next mention fragment, whichever comes first.
fn rest_end(text: &str, from: usize, later: &[Head]) -> usize {
    let line_end = text[from..].find('\n').map_or(text.len(), |i| from + i);
    later
        .iter()
        .find(|h| h.is_boundary())
        .map_or(line_end, |h| h.start.min(line_end))
}
