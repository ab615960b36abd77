use regex::Captures;

use crate::{
    grammar::{Grammar, Pattern},
    model::{Operands, ParsedCommand},
};

/// Which operator grammar a fragment is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Give,
    Take,
}

impl Operator {
    const fn pattern(self) -> Pattern {
        match self {
            Self::Give => Pattern::Give,
            Self::Take => Pattern::Take,
        }
    }
}

/// Pulls user token, operator run and reason out of a give/take fragment.
///
/// The start-of-message alternative fills capture groups 1..=3 and the
/// embedded alternative fills 4..=6; both come out as the same [`Operands`].
#[must_use]
pub fn extract(grammar: &Grammar, operator: Operator, fragment: &str) -> Option<Operands> {
    let caps = grammar.regex(operator.pattern()).captures(fragment)?;
    let base = if caps.get(1).is_some() { 1 } else { 4 };
    operands(&caps, base)
}

/// Parses a fragment as give, then take.
#[must_use]
pub fn parse_operation(grammar: &Grammar, fragment: &str) -> Option<ParsedCommand> {
    extract(grammar, Operator::Give, fragment)
        .map(ParsedCommand::Give)
        .or_else(|| extract(grammar, Operator::Take, fragment).map(ParsedCommand::Take))
}

fn operands(caps: &Captures<'_>, base: usize) -> Option<Operands> {
    let user_token = caps.get(base)?.as_str().to_owned();
    let magnitude_run = caps.get(base + 1)?.as_str().to_owned();
    let reason = caps
        .get(base + 2)
        .map(|m| m.as_str().trim().to_owned())
        .filter(|r| !r.is_empty());
    Some(Operands {
        user_token,
        magnitude_run,
        reason,
    })
}
