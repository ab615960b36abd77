use core::fmt::Write as _;
use std::sync::Arc;

use karma_core::{
    CommandError, DashboardProvider, Grammar, KarmaOperation, KarmaStore, MessageEvent, Operands,
    ParsedCommand, Policy, ReactionEvent, ReactjiPolicy, ReplyContext, ReplyMode, StoreError,
    UserResolver, classify, text::{munge, truncate},
};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::router::{Persona, Reply, ReplyRouter};

/// Upper bound on leaderboard length, whatever the request says.
pub const MAX_LEADERBOARD: usize = 100;

#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub motivate: bool,
    pub leaderboard_limit: usize,
    pub reply_mode: ReplyMode,
    pub debug: bool,
}

/// Turns classified messages and reactions into store writes and replies.
///
/// Nothing returned from here is an error: every failure is logged and, where
/// a user is waiting, answered.
pub struct Handler {
    pub grammar: Arc<Grammar>,
    pub resolver: UserResolver,
    pub policy: Policy,
    pub reactji: ReactjiPolicy,
    pub store: Arc<dyn KarmaStore>,
    pub dashboard: Arc<dyn DashboardProvider>,
    pub router: ReplyRouter,
    pub settings: HandlerSettings,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Handler {
    pub async fn handle_message(&self, msg: MessageEvent) {
        info!(channel = %msg.channel, sender = %msg.user, body = %truncate(&msg.text, 200), "Incoming message");

        let classification = classify(&self.grammar, &msg.text, self.settings.motivate);
        if classification.rewritten {
            debug!(text = %classification.text, "Rewrote motivate command");
        }
        if classification.is_empty() {
            return;
        }

        let ctx = ReplyContext {
            channel: msg.channel,
            message_ts: msg.ts,
            thread_ts: msg.thread_ts,
            sender_id: msg.user,
            reply_mode: self.settings.reply_mode,
        };
        for command in &classification.commands {
            let reply = match self.execute(&ctx, command).await {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(err) => {
                    self.log_failure(command.kind(), &err);
                    Reply::new(err.user_message(self.settings.debug), error_persona(command, &err))
                }
            };
            if let Err(e) = self.router.reply(&ctx, &reply).await {
                warn!(error = %e, channel = %ctx.channel, command = command.kind(), "Failed to send reply");
            }
        }
    }

    /// `added` is false for a removed reaction, which undoes its vote.
    pub async fn handle_reaction(&self, event: ReactionEvent, added: bool) {
        let Some(delta) = self.reactji.vote(&event.reaction, added) else {
            debug!(reaction = %event.reaction, "Reaction is not a vote");
            return;
        };
        let Some(author) = event.item_user.as_deref() else {
            debug!(reaction = %event.reaction, "Reacted item has no author");
            return;
        };
        let verb = if added { "adding" } else { "removing" };
        let reason = format!("{verb} a :{}: reactji", event.reaction);

        let reply = match self.reactji_karma(&event.user, author, delta, reason).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(err) => {
                self.log_failure("reactji", &err);
                if !err.is_expected() {
                    return;
                }
                Reply::new(err.user_message(self.settings.debug), Persona::for_delta(delta))
            }
        };
        if let Err(e) = self
            .router
            .direct(&event.user, &event.channel, self.settings.reply_mode, &reply)
            .await
        {
            warn!(error = %e, user = %event.user, "Failed to send reactji reply");
        }
    }

    async fn execute(
        &self,
        ctx: &ReplyContext,
        command: &ParsedCommand,
    ) -> Result<Option<Reply>, CommandError> {
        match command {
            ParsedCommand::Give(ops) | ParsedCommand::Take(ops) => self.karma(ctx, ops).await,
            // Rewritten into a give during classification.
            ParsedCommand::Motivate { .. } => Ok(None),
            ParsedCommand::Query { user_token } => self.query(user_token).await.map(Some),
            ParsedCommand::Throwback { user_token } => {
                self.throwback(ctx, user_token.as_deref()).await.map(Some)
            }
            ParsedCommand::Leaderboard { limit } => self.leaderboard(*limit).await.map(Some),
            ParsedCommand::UrlRequest => self.url(),
        }
    }

    async fn karma(&self, ctx: &ReplyContext, ops: &Operands) -> Result<Option<Reply>, CommandError> {
        let delta = self.policy.compute_delta(&ops.magnitude_run);
        if delta == 0 {
            debug!(to = %ops.user_token, "Nothing to record");
            return Ok(None);
        }
        let from = self.resolver.resolve_id(&ctx.sender_id).await?;
        let to = self.resolver.resolve(&ops.user_token).await?;
        self.record(from, to, delta, ops.reason.clone()).await
    }

    async fn reactji_karma(
        &self,
        reactor: &str,
        author: &str,
        delta: i64,
        reason: String,
    ) -> Result<Option<Reply>, CommandError> {
        let from = self.resolver.resolve_id(reactor).await?;
        let to = self.resolver.resolve_id(author).await?;
        self.record(from, to, delta, Some(reason)).await
    }

    /// Policy check, then persistence, then the running total.
    async fn record(
        &self,
        from: String,
        to: String,
        delta: i64,
        reason: Option<String>,
    ) -> Result<Option<Reply>, CommandError> {
        self.policy.check_target(&from, &to)?;
        let Some(op) = KarmaOperation::new(from, to, delta, reason) else {
            return Ok(None);
        };
        self.store.insert_operation(&op).await?;
        let total = self.store.user_points(&op.to).await?;
        info!(from = %op.from, to = %op.to, delta, total, "Karma recorded");
        Ok(Some(Reply::new(points_message(&op, total), Persona::for_delta(delta))))
    }

    async fn query(&self, token: &str) -> Result<Reply, CommandError> {
        let name = self.resolver.resolve(token).await?;
        let points = self.store.user_points(&name).await?;
        Ok(Reply::neutral(format!("{name} == {points}")))
    }

    async fn throwback(&self, ctx: &ReplyContext, token: Option<&str>) -> Result<Reply, CommandError> {
        let user = match token {
            Some(token) => self.resolver.resolve(token).await?,
            None => self.resolver.resolve_id(&ctx.sender_id).await?,
        };
        match self.store.throwback(&user).await {
            Ok(op) => Ok(Reply::neutral(throwback_message(&op, OffsetDateTime::now_utc()))),
            Err(StoreError::NoSuchUser(_)) => Ok(Reply::neutral(format!(
                "could not find any karma operations for {user}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn leaderboard(&self, requested: Option<usize>) -> Result<Reply, CommandError> {
        let limit = match requested {
            Some(0) | None => self.settings.leaderboard_limit,
            Some(n) => n,
        }
        .clamp(1, MAX_LEADERBOARD);
        let url = self.dashboard.url(&format!("/leaderboard/{limit}"))?;
        let entries = self.store.leaderboard(limit).await?;

        let mut text = format!("*top {limit} leaderboard*\n");
        if !url.is_empty() {
            text.push_str(&url);
            text.push('\n');
        }
        for (idx, entry) in entries.iter().enumerate() {
            let _ = writeln!(text, "{}. {} == {}", idx + 1, munge(&entry.name), entry.points);
        }
        Ok(Reply::neutral(text.trim_end()))
    }

    fn url(&self) -> Result<Option<Reply>, CommandError> {
        let url = self.dashboard.url("/")?;
        Ok((!url.is_empty()).then(|| Reply::neutral(url)))
    }

    fn log_failure(&self, command: &str, err: &CommandError) {
        if err.is_expected() {
            info!(command, reason = %err, "Command rejected");
        } else {
            error!(command, error = %err, detail = ?err, debug = self.settings.debug, "Command failed");
        }
    }
}

fn points_message(op: &KarmaOperation, total: i64) -> String {
    let mut text = format!("{} now has {total} points({:+}", op.to, op.delta);
    if let Some(reason) = &op.reason {
        let _ = write!(text, " for {reason}");
    }
    text.push(')');
    text
}

fn throwback_message(op: &KarmaOperation, now: OffsetDateTime) -> String {
    let ago = karma_core::text::humanize_ago(op.timestamp, now);
    let mut text = format!(
        "{} received {} points from {} {ago}",
        munge(&op.to),
        op.delta,
        munge(&op.from)
    );
    if let Some(reason) = &op.reason {
        let _ = write!(text, " for {reason}");
    }
    text
}

/// Policy refusals speak with the voice the operation would have had.
const fn error_persona(command: &ParsedCommand, err: &CommandError) -> Persona {
    match (err, command) {
        (CommandError::Policy(_), ParsedCommand::Take(_)) => Persona::Bad,
        (CommandError::Policy(_), ParsedCommand::Give(_)) => Persona::Good,
        _ => Persona::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use karma_core::{
        AliasTable, LeaderboardEntry, NoDashboard, StaticDashboard, error::GENERIC_FAILURE,
        grammar::DEFAULT_BOT_NAMES,
    };
    use karma_store::MemoryStore;
    use time::{Duration, macros::datetime};

    use super::*;
    use crate::{
        quotes::QuoteBook,
        testing::{FakeChat, Sent},
    };

    const USERS: [(&str, &str); 4] = [("U1", "Bob"), ("U2", "alice"), ("U123", "carol"), ("U7", "dave")];

    struct Fixture {
        good: Arc<FakeChat>,
        bad: Arc<FakeChat>,
        store: Arc<MemoryStore>,
        handler: Handler,
    }

    fn fixture() -> Fixture {
        let good = Arc::new(FakeChat::with_users(&USERS));
        let bad = Arc::new(FakeChat::default());
        let store = Arc::new(MemoryStore::new());
        let grammar = Arc::new(Grammar::new(&DEFAULT_BOT_NAMES).unwrap());
        let handler = Handler {
            resolver: UserResolver::new(
                Arc::clone(&grammar),
                Arc::new(AliasTable::default()),
                Arc::clone(&good) as _,
            ),
            grammar,
            policy: Policy::default(),
            reactji: ReactjiPolicy::default(),
            store: Arc::clone(&store) as _,
            dashboard: Arc::new(NoDashboard),
            router: ReplyRouter::new(
                Arc::clone(&good) as _,
                Arc::clone(&bad) as _,
                QuoteBook::new(0.0, Vec::new(), Vec::new()),
            ),
            settings: HandlerSettings {
                motivate: true,
                leaderboard_limit: 10,
                reply_mode: ReplyMode::Message,
                debug: false,
            },
        };
        Fixture {
            good,
            bad,
            store,
            handler,
        }
    }

    fn message(user: &str, text: &str) -> MessageEvent {
        MessageEvent {
            channel: "C1".to_owned(),
            user: user.to_owned(),
            text: text.to_owned(),
            ts: "100.0".to_owned(),
            thread_ts: None,
        }
    }

    fn reaction(reaction: &str) -> ReactionEvent {
        ReactionEvent {
            user: "U1".to_owned(),
            item_user: Some("U2".to_owned()),
            reaction: reaction.to_owned(),
            channel: "C1".to_owned(),
            ts: "50.0".to_owned(),
        }
    }

    impl Fixture {
        async fn say(&self, user: &str, text: &str) {
            self.handler.handle_message(message(user, text)).await;
        }

        async fn recorded(&self) -> Vec<(String, String, i64, Option<String>)> {
            self.store
                .operations()
                .await
                .into_iter()
                .map(|op| (op.from, op.to, op.delta, op.reason))
                .collect()
        }

        async fn seed(&self, to: &str, delta: i64) {
            let op = KarmaOperation::new("seed", to, delta, None).unwrap();
            self.store.insert_operation(&op).await.unwrap();
        }
    }

    fn row(from: &str, to: &str, delta: i64, reason: Option<&str>) -> (String, String, i64, Option<String>) {
        (from.to_owned(), to.to_owned(), delta, reason.map(ToOwned::to_owned))
    }

    #[tokio::test]
    async fn give_records_and_replies_as_good() {
        let fx = fixture();
        fx.say("U1", "alice++").await;
        assert_eq!(fx.recorded().await, vec![row("bob", "alice", 1, None)]);
        assert_eq!(fx.good.texts(), vec!["alice now has 1 points(+1)"]);
        assert!(fx.bad.sent().is_empty());
    }

    #[tokio::test]
    async fn take_with_reason_replies_as_bad() {
        let fx = fixture();
        fx.say("U2", "bob----- for sleeping in").await;
        assert_eq!(
            fx.recorded().await,
            vec![row("alice", "bob", -4, Some("sleeping in"))]
        );
        assert_eq!(fx.bad.texts(), vec!["bob now has -4 points(-4 for sleeping in)"]);
        assert!(fx.good.sent().is_empty());
    }

    #[tokio::test]
    async fn embedded_mention_is_resolved() {
        let fx = fixture();
        fx.say("U1", "thanks <@U123>++ great job").await;
        assert_eq!(fx.recorded().await, vec![row("bob", "carol", 1, None)]);
    }

    #[tokio::test]
    async fn one_reply_per_operation() {
        let fx = fixture();
        fx.say("U1", "alice++ for the docs <@U123>-- and dave+++").await;
        assert_eq!(
            fx.recorded().await,
            vec![
                row("bob", "alice", 1, Some("the docs")),
                row("bob", "carol", -1, None),
                row("bob", "dave", 2, None),
            ]
        );
        assert_eq!(fx.good.sent().len(), 2);
        assert_eq!(fx.bad.sent().len(), 1);
    }

    #[tokio::test]
    async fn leaderboard_is_ranked_and_munged() {
        let fx = fixture();
        for (to, delta) in [("alice", 5), ("carol", 3), ("bob", -1), ("dave", 2)] {
            fx.seed(to, delta).await;
        }
        fx.say("U1", "janet top 3").await;
        assert_eq!(
            fx.good.texts(),
            vec!["*top 3 leaderboard*\n1. a\u{200b}lice == 5\n2. c\u{200b}arol == 3\n3. d\u{200b}ave == 2"]
        );
    }

    #[tokio::test]
    async fn leaderboard_links_the_dashboard_and_caps_the_limit() {
        let mut fx = fixture();
        fx.handler.dashboard = Arc::new(StaticDashboard::new("https://karma.example.com").unwrap());
        fx.seed("alice", 1).await;
        fx.say("U1", "karma leaderboard 5000").await;
        assert_eq!(
            fx.good.texts(),
            vec!["*top 100 leaderboard*\nhttps://karma.example.com/leaderboard/100\n1. a\u{200b}lice == 1"]
        );
    }

    #[tokio::test]
    async fn query_of_unknown_user_is_verbatim_without_debug() {
        let fx = fixture();
        fx.say("U1", "dave==").await;
        assert_eq!(fx.good.texts(), vec!["no such user: dave"]);
    }

    #[tokio::test]
    async fn query_reports_points() {
        let fx = fixture();
        fx.seed("carol", 4).await;
        fx.say("U1", "<@U123>==").await;
        assert_eq!(fx.good.texts(), vec!["carol == 4"]);
    }

    #[tokio::test]
    async fn rejected_operations_never_reach_storage() {
        let mut fx = fixture();
        fx.handler.policy = Policy {
            self_karma: false,
            blacklist: ["alice"].into_iter().collect(),
            ..Policy::default()
        };
        fx.say("U1", "bob++").await;
        fx.say("U1", "alice--").await;
        assert!(fx.recorded().await.is_empty());
        assert_eq!(fx.good.texts(), vec!["You cannot give yourself points."]);
        assert_eq!(fx.bad.texts(), vec!["alice can't receive karma."]);
    }

    #[tokio::test]
    async fn lookup_failure_is_generic_unless_debug() {
        let mut fx = fixture();
        fx.say("U1", "<@U404>++").await;
        assert_eq!(fx.good.texts(), vec![GENERIC_FAILURE]);

        fx.handler.settings.debug = true;
        fx.say("U1", "<@U404>++").await;
        assert!(fx.good.texts()[1].contains("U404"));
        assert!(fx.recorded().await.is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl KarmaStore for BrokenStore {
        async fn insert_operation(&self, _op: &KarmaOperation) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_owned()))
        }

        async fn user_points(&self, _name: &str) -> Result<i64, StoreError> {
            Err(StoreError::Backend("disk full".to_owned()))
        }

        async fn leaderboard(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
            Err(StoreError::Backend("disk full".to_owned()))
        }

        async fn throwback(&self, _name: &str) -> Result<KarmaOperation, StoreError> {
            Err(StoreError::Backend("disk full".to_owned()))
        }

        async fn total_points(&self) -> Result<i64, StoreError> {
            Err(StoreError::Backend("disk full".to_owned()))
        }
    }

    #[tokio::test]
    async fn persistence_failure_gets_one_generic_reply() {
        let mut fx = fixture();
        fx.handler.store = Arc::new(BrokenStore);
        fx.say("U1", "alice++").await;
        fx.say("U1", "janet top").await;
        assert_eq!(fx.good.texts(), vec![GENERIC_FAILURE, GENERIC_FAILURE]);
    }

    #[tokio::test]
    async fn throwback_defaults_to_the_sender() {
        let fx = fixture();
        fx.say("U1", "janet throwback").await;
        assert_eq!(
            fx.good.texts(),
            vec!["could not find any karma operations for bob"]
        );
    }

    #[tokio::test]
    async fn throwback_describes_a_past_operation() {
        let fx = fixture();
        let op = KarmaOperation::new("bob", "alice", 2, Some("lunch".to_owned())).unwrap();
        fx.store.insert_operation(&op).await.unwrap();
        fx.say("U7", "janet throwback alice").await;
        let texts = fx.good.texts();
        assert!(texts[0].starts_with("a\u{200b}lice received 2 points from b\u{200b}ob "), "{texts:?}");
        assert!(texts[0].ends_with(" for lunch"), "{texts:?}");
    }

    #[test]
    fn throwback_text_uses_relative_time() {
        let now = datetime!(2024-03-10 12:00 UTC);
        let op = KarmaOperation::at("bob", "alice", -3, None, now - Duration::days(3)).unwrap();
        assert_eq!(
            throwback_message(&op, now),
            "a\u{200b}lice received -3 points from b\u{200b}ob 3 days ago"
        );
    }

    #[tokio::test]
    async fn url_only_when_dashboard_enabled() {
        let mut fx = fixture();
        fx.say("U1", "karma link").await;
        assert!(fx.good.sent().is_empty());

        fx.handler.dashboard = Arc::new(StaticDashboard::new("https://karma.example.com").unwrap());
        fx.say("U1", "karma link").await;
        assert_eq!(fx.good.texts(), vec!["https://karma.example.com"]);
    }

    #[tokio::test]
    async fn reactji_votes_and_undoes() {
        let fx = fixture();
        fx.handler.handle_reaction(reaction("+1"), true).await;
        fx.handler.handle_reaction(reaction("+1"), false).await;
        fx.handler.handle_reaction(reaction("tada"), true).await;
        assert_eq!(
            fx.recorded().await,
            vec![
                row("bob", "alice", 1, Some("adding a :+1: reactji")),
                row("bob", "alice", -1, Some("removing a :+1: reactji")),
            ]
        );
        assert_eq!(
            fx.good.sent(),
            vec![Sent::message(
                "D-U1",
                None,
                "alice now has 1 points(+1 for adding a :+1: reactji)"
            )]
        );
        assert_eq!(
            fx.bad.texts(),
            vec!["alice now has 0 points(-1 for removing a :+1: reactji)"]
        );
    }

    #[tokio::test]
    async fn reactji_is_ephemeral_in_ephemeral_mode() {
        let mut fx = fixture();
        fx.handler.settings.reply_mode = ReplyMode::Ephemeral;
        fx.handler.handle_reaction(reaction("thumbsdown"), true).await;
        assert_eq!(
            fx.bad.sent(),
            vec![Sent::ephemeral("C1", "U1", None, "alice now has -1 points(-1 for adding a :thumbsdown: reactji)")]
        );
    }

    #[tokio::test]
    async fn thread_mode_replies_in_a_thread() {
        let mut fx = fixture();
        fx.handler.settings.reply_mode = ReplyMode::Thread;
        fx.say("U1", "alice++").await;
        assert_eq!(
            fx.good.sent(),
            vec![Sent::message("C1", Some("100.0"), "alice now has 1 points(+1)")]
        );
    }

    #[tokio::test]
    async fn aliases_resolve_before_policy_checks() {
        let mut fx = fixture();
        let grammar = Arc::clone(&fx.handler.grammar);
        let aliases = AliasTable::from_specs(&["boss++ceo", "alice++ali"]).unwrap();
        let lookup = Arc::new(FakeChat::with_users(&[("U1", "Bob"), ("U9", "ali")]));
        fx.handler.resolver = UserResolver::new(grammar, Arc::new(aliases), lookup);
        fx.handler.policy = Policy {
            self_karma: false,
            blacklist: ["boss"].into_iter().collect(),
            ..Policy::default()
        };

        fx.say("U1", "ceo++").await;
        fx.say("U9", "alice++").await;
        assert!(fx.recorded().await.is_empty());
        assert_eq!(
            fx.good.texts(),
            vec!["boss can't receive karma.", "You cannot give yourself points."]
        );
    }

    #[tokio::test]
    async fn unrewritten_motivate_is_a_no_op() {
        let fx = fixture();
        let ctx = ReplyContext {
            channel: "C1".to_owned(),
            message_ts: "1.0".to_owned(),
            thread_ts: None,
            sender_id: "U1".to_owned(),
            reply_mode: ReplyMode::Message,
        };
        let command = ParsedCommand::Motivate {
            user_token: "<@U7>".to_owned(),
        };
        assert!(fx.handler.execute(&ctx, &command).await.unwrap().is_none());
        assert!(fx.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn motivate_gives_a_point() {
        let fx = fixture();
        fx.say("U1", "!m <@U7>").await;
        assert_eq!(
            fx.recorded().await,
            vec![row("bob", "dave", 1, Some(karma_core::classify::MOTIVATE_REASON))]
        );
    }

    #[tokio::test]
    async fn zero_delta_and_chatter_are_silent() {
        let mut fx = fixture();
        fx.say("U1", "just chatting").await;
        fx.handler.policy.max_points = 0;
        fx.say("U1", "alice+++").await;
        assert!(fx.recorded().await.is_empty());
        assert!(fx.good.sent().is_empty());
    }
}
