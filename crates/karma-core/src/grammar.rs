//! Matchers for every command shape the bot understands.
//!
//! Give and take patterns are evaluated against *fragments*: either the
//! beginning of a message, or a slice of it that starts with the whitespace
//! in front of an embedded `user++`. Both alternatives are anchored at the
//! fragment start, which keeps give and take mutually exclusive.
//! All other patterns are evaluated against the whole message.

use regex::Regex;

use crate::model::ParsedCommand;

pub const DEFAULT_BOT_NAMES: [&str; 2] = ["janet", "karma"];

/// A user token: a platform mention (`<@U123>` or `<@U123|name>`) or a bare
/// word-like name. A leading `@` is tolerated and left out of the capture.
const USER: &str = r"@?(<@[A-Za-z0-9]+(?:\|[^>]*)?>|\w[A-Za-z0-9_.\-]*?)";
/// Separator clients insert after autocompleting a name at message start.
const AUTOCOMPLETE: &str = r":? ?";
/// Mid-sentence only the explicit `: ` form is accepted.
const EXPLICIT_AUTOCOMPLETE: &str = r"(?:: )?";
const GOOD_POINTS: &str = r"(\+{2,})";
const BAD_POINTS: &str = r"(-{2,})";
const REASON: &str = r"(?: +for +(.*))?";

const HEADS: &str = r"(?:^|\s+)@?(?:(<@[A-Za-z0-9]+(?:\|[^>]*)?>)(?::? ?(\+{2,}|-{2,}))?|(\w[A-Za-z0-9_.\-]*?):? ?(\+{2,}|-{2,}))";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Give,
    Take,
    Query,
    Motivate,
    Throwback,
    Leaderboard,
    Url,
    Mention,
}

/// A user token, optionally followed by an operator run, located in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    pub start: usize,
    pub end: usize,
    pub mention: bool,
    pub has_operator: bool,
}

impl Head {
    /// Mentions with an operator split a message into independent fragments.
    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        self.mention && self.has_operator
    }
}

/// Every pattern, compiled once and shared by reference afterwards.
#[derive(Debug, Clone)]
pub struct Grammar {
    give: Regex,
    take: Regex,
    query: Regex,
    motivate: Regex,
    throwback: Regex,
    leaderboard: Regex,
    url: Regex,
    mention: Regex,
    heads: Regex,
    reason_tail: Regex,
}

impl Grammar {
    /// Compiles the grammar. `bot_names` are the words that address the bot in
    /// leaderboard, url and throwback commands; an empty list selects
    /// [`DEFAULT_BOT_NAMES`].
    pub fn new<S: AsRef<str>>(bot_names: &[S]) -> Result<Self, regex::Error> {
        let names = bot_name_alternation(bot_names);
        Ok(Self {
            give: Regex::new(&operation(GOOD_POINTS))?,
            take: Regex::new(&operation(BAD_POINTS))?,
            query: Regex::new(&format!("^{USER}{AUTOCOMPLETE}==$"))?,
            motivate: Regex::new(&format!(r"^[?!]m +{USER}{AUTOCOMPLETE}$"))?,
            throwback: Regex::new(&format!(
                r"(?i)^{names} throwback ?(?:{USER}{AUTOCOMPLETE})?$"
            ))?,
            leaderboard: Regex::new(&format!(
                r"(?i)^{names} (?:leaderboard|top|highscores) ?([0-9]+)?$"
            ))?,
            url: Regex::new(&format!(r"(?i)^{names} (?:url|web|link)$"))?,
            mention: Regex::new(r"^<@([A-Za-z0-9]+)(?:\|[^>]*)?>$")?,
            heads: Regex::new(HEADS)?,
            reason_tail: Regex::new(r"^ +for +\S")?,
        })
    }

    #[must_use]
    pub fn is_match(&self, pattern: Pattern, text: &str) -> bool {
        self.regex(pattern).is_match(text)
    }

    pub(crate) const fn regex(&self, pattern: Pattern) -> &Regex {
        match pattern {
            Pattern::Give => &self.give,
            Pattern::Take => &self.take,
            Pattern::Query => &self.query,
            Pattern::Motivate => &self.motivate,
            Pattern::Throwback => &self.throwback,
            Pattern::Leaderboard => &self.leaderboard,
            Pattern::Url => &self.url,
            Pattern::Mention => &self.mention,
        }
    }

    /// Returns the platform user id when `token` is exactly a mention.
    #[must_use]
    pub fn mention_id<'t>(&self, token: &'t str) -> Option<&'t str> {
        self.mention
            .captures(token)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Non-overlapping, leftmost scan for mentions and `name++`/`name--` heads.
    ///
    /// A bare name whose operator run runs straight into another word
    /// (`foo--bar`) is not a head.
    #[must_use]
    pub fn heads(&self, text: &str) -> Vec<Head> {
        self.heads
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let operator = caps.get(2).or_else(|| caps.get(4));
                if caps.get(3).is_some()
                    && text[whole.end()..]
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_alphanumeric() || c == '_')
                {
                    return None;
                }
                Some(Head {
                    start: whole.start(),
                    end: whole.end(),
                    mention: caps.get(1).is_some(),
                    has_operator: operator.is_some(),
                })
            })
            .collect()
    }

    /// Whether text following a head opens a ` for <reason>` clause.
    #[must_use]
    pub fn opens_reason(&self, tail: &str) -> bool {
        self.reason_tail.is_match(tail)
    }

    #[must_use]
    pub fn parse_query(&self, text: &str) -> Option<ParsedCommand> {
        let caps = self.query.captures(text)?;
        Some(ParsedCommand::Query {
            user_token: caps.get(1)?.as_str().to_owned(),
        })
    }

    #[must_use]
    pub fn parse_motivate(&self, text: &str) -> Option<ParsedCommand> {
        let caps = self.motivate.captures(text)?;
        Some(ParsedCommand::Motivate {
            user_token: caps.get(1)?.as_str().to_owned(),
        })
    }

    #[must_use]
    pub fn parse_throwback(&self, text: &str) -> Option<ParsedCommand> {
        let caps = self.throwback.captures(text)?;
        Some(ParsedCommand::Throwback {
            user_token: caps.get(1).map(|m| m.as_str().to_owned()),
        })
    }

    /// Limits too large for `usize` saturate; callers cap them anyway.
    #[must_use]
    pub fn parse_leaderboard(&self, text: &str) -> Option<ParsedCommand> {
        let caps = self.leaderboard.captures(text)?;
        let limit = caps
            .get(1)
            .map(|m| m.as_str().parse::<usize>().unwrap_or(usize::MAX));
        Some(ParsedCommand::Leaderboard { limit })
    }

    #[must_use]
    pub fn parse_url(&self, text: &str) -> Option<ParsedCommand> {
        self.url.is_match(text).then_some(ParsedCommand::UrlRequest)
    }
}

fn operation(points: &str) -> String {
    format!(
        r"(?:^{USER}{AUTOCOMPLETE}{points}{REASON}$)|(?:^\s+{USER}{EXPLICIT_AUTOCOMPLETE}{points}{REASON}$)"
    )
}

fn bot_name_alternation<S: AsRef<str>>(bot_names: &[S]) -> String {
    let mut names: Vec<String> = bot_names
        .iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .map(|n| regex::escape(&n))
        .collect();
    if names.is_empty() {
        names = DEFAULT_BOT_NAMES.iter().map(|n| (*n).to_owned()).collect();
    }
    format!("(?:{})(?:bot)?", names.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Grammar {
        Grammar::new(&DEFAULT_BOT_NAMES).unwrap()
    }

    fn check(pattern: Pattern, matching: &[&str], rejected: &[&str]) {
        let g = grammar();
        for line in matching {
            assert!(g.is_match(pattern, line), "{pattern:?} should match {line:?}");
        }
        for line in rejected {
            assert!(!g.is_match(pattern, line), "{pattern:?} should reject {line:?}");
        }
    }

    #[test]
    fn give_fragments() {
        check(
            Pattern::Give,
            &[
                "user++",
                "@user+++",
                "user+++++++",
                "user+++ for reason",
                "user ++++ for autocomplete",
                "user: ++",
                "<@U147391>++++",
                "<@U147391|carol>++",
                " sentence++",
                " sentence++ for karma reasons",
                " sentence: ++++ for karma reasons",
            ],
            &[
                "user+",
                "user+-",
                "user--",
                " sentence ++",
                " sentence:++",
                "middle of the sentence++",
            ],
        );
    }

    #[test]
    fn take_fragments() {
        check(
            Pattern::Take,
            &[
                "user--",
                "@user---",
                "user-------",
                "user: ---- for reasons",
                " sentence--",
                " well-known--",
            ],
            &["user-", "@user-+", "user++", " sentence -- test", " sentence ----"],
        );
    }

    #[test]
    fn give_and_take_never_overlap() {
        let g = grammar();
        let samples = [
            "a++ for b--",
            "a-- for b++",
            "a--++",
            "a-- ++",
            "a---b++",
            " x-- for c++ fans",
            "<@U1>++ for <@U2>--",
            "a: ++--",
        ];
        for s in samples {
            assert!(
                !(g.is_match(Pattern::Give, s) && g.is_match(Pattern::Take, s)),
                "{s:?} matched both"
            );
        }
    }

    #[test]
    fn query_pattern() {
        check(
            Pattern::Query,
            &["user==", "@user==", "<@U1384>==", "user: =="],
            &["user=", "user===", "@user=", "middle of the sentence user=="],
        );
    }

    #[test]
    fn motivate_pattern() {
        check(
            Pattern::Motivate,
            &["!m user", "?m user", "?m     <@U1384>"],
            &["?m user for work", "middle of the sentence ?m user", "?muser", "!!muser"],
        );
    }

    #[test]
    fn leaderboard_pattern() {
        check(
            Pattern::Leaderboard,
            &["karma highscores", "janet top 10", "janet top 1001", "janet top ", "janetbot leaderboard"],
            &["janet top 913f", "janet karma highscores", "someone top 3"],
        );
    }

    #[test]
    fn url_pattern() {
        check(
            Pattern::Url,
            &["janet web", "karma link", "janet link", "Janet URL"],
            &["janet web 194", "janet"],
        );
    }

    #[test]
    fn throwback_pattern() {
        check(
            Pattern::Throwback,
            &[
                "janet throwback <@U3494519>",
                "janet throwback <@B34839>",
                "janet throwback @name",
                "janet throwback user",
                "janet throwback",
            ],
            &["janet throwback two users", "throwback"],
        );
    }

    #[test]
    fn mention_pattern() {
        check(
            Pattern::Mention,
            &["<@U1934>", "<@P1934>", "<@whatever>", "<@U1|bob>"],
            &["<@user", "<user>", "user>", "<@>"],
        );
        assert_eq!(grammar().mention_id("<@U1|bob>"), Some("U1"));
        assert_eq!(grammar().mention_id("bob"), None);
    }

    #[test]
    fn configured_bot_names_are_escaped() {
        let g = Grammar::new(&["the.bot"]).unwrap();
        assert!(g.is_match(Pattern::Leaderboard, "the.bot top 3"));
        assert!(!g.is_match(Pattern::Leaderboard, "theXbot top 3"));
        assert!(!g.is_match(Pattern::Leaderboard, "janet top 3"));
    }

    #[test]
    fn leaderboard_limit_is_optional() {
        let g = grammar();
        assert_eq!(
            g.parse_leaderboard("janet top 3"),
            Some(ParsedCommand::Leaderboard { limit: Some(3) })
        );
        assert_eq!(
            g.parse_leaderboard("karma leaderboard"),
            Some(ParsedCommand::Leaderboard { limit: None })
        );
        assert_eq!(
            g.parse_leaderboard("janet top 99999999999999999999999"),
            Some(ParsedCommand::Leaderboard { limit: Some(usize::MAX) })
        );
    }

    #[test]
    fn heads_skip_operator_runs_glued_to_words() {
        let g = grammar();
        let text = "run --verbose and foo--bar but bob-- and <@U1>";
        let heads = g.heads(text);
        let found: Vec<&str> = heads.iter().map(|h| text[h.start..h.end].trim()).collect();
        assert_eq!(found, vec!["bob--", "<@U1>"]);
        assert!(heads[0].has_operator && !heads[0].mention);
        assert!(heads[1].mention && !heads[1].has_operator);
        assert!(!heads[1].is_boundary());
    }
}
