mod config;
mod handler;
mod listener;
mod logging;
mod quotes;
mod router;
#[cfg(test)]
mod testing;

use std::{io::IsTerminal as _, path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use karma_core::{ChatService, Grammar, KarmaStore as _, ReplyMode, UserLookup, UserResolver};
use karma_store::SqliteStore;
use slack::SlackClient;
use tracing::info;

use crate::{
    config::load_config,
    handler::Handler,
    listener::{Identity, listen},
    logging::init_tracing,
    router::ReplyRouter,
};

#[derive(Parser, Debug)]
#[command(
    name = "karma-bot",
    version,
    about = "Slack karma bot with a good and a bad identity"
)]
struct Args {
    /// Bot token (xoxb-) for the identity that hands out karma
    #[arg(long, env = "KARMA_GOOD_BOT_TOKEN", hide_env_values = true)]
    good_bot_token: String,

    /// App-level token (xapp-) for the good identity's socket connection
    #[arg(long, env = "KARMA_GOOD_APP_TOKEN", hide_env_values = true)]
    good_app_token: String,

    /// Bot token (xoxb-) for the identity that takes karma away
    #[arg(long, env = "KARMA_BAD_BOT_TOKEN", hide_env_values = true)]
    bad_bot_token: String,

    /// App-level token (xapp-) for the bad identity's socket connection
    #[arg(long, env = "KARMA_BAD_APP_TOKEN", hide_env_values = true)]
    bad_app_token: String,

    /// SQLite database holding the karma ledger
    #[arg(long, env = "KARMA_DB", default_value = "./karma.sqlite3")]
    db: PathBuf,

    /// Path to YAML config; a missing file means defaults
    #[arg(long, env = "KARMA_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Debug logging and detailed error replies
    #[arg(short = 'd', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = load_config(&args.config)?;
    let debug = args.debug || config.debug;
    init_tracing(debug)?;

    let grammar = Arc::new(Grammar::new(&config.bot_names).context("compiling command grammar")?);
    let store = Arc::new(
        SqliteStore::open(&args.db)
            .with_context(|| format!("opening karma database at {}", args.db.display()))?,
    );

    let good = Arc::new(SlackClient::new("good", &args.good_bot_token, &args.good_app_token));
    let bad = Arc::new(SlackClient::new("bad", &args.bad_bot_token, &args.bad_app_token));
    let good_chat: Arc<dyn ChatService> = Arc::clone(&good) as _;
    let bad_chat: Arc<dyn ChatService> = Arc::clone(&bad) as _;
    let lookup: Arc<dyn UserLookup> = good;

    let handler = Arc::new(Handler {
        resolver: UserResolver::new(
            Arc::clone(&grammar),
            Arc::new(config.aliases().context("loading aliases")?),
            lookup,
        ),
        grammar,
        policy: config.policy(),
        reactji: config.reactji().context("loading reactji settings")?,
        store: Arc::clone(&store) as _,
        dashboard: config.dashboard().context("loading dashboard settings")?,
        router: ReplyRouter::new(
            Arc::clone(&good_chat),
            Arc::clone(&bad_chat),
            config.quote_book(),
        ),
        settings: config.handler_settings(debug),
    });

    let total = store
        .total_points()
        .await
        .context("reading karma totals")?;
    info!(
        db = %args.db.display(),
        total_points = total,
        reply_mode = ?config.reply_mode,
        "Karma ledger ready"
    );
    print_banner(config.reply_mode, total);

    tokio::select! {
        res = async {
            tokio::try_join!(
                listen(Identity::Good, good_chat, Arc::clone(&handler)),
                listen(Identity::Bad, bad_chat, Arc::clone(&handler)),
            )
        } => {
            res?;
        }
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            info!("Shutting down");
        }
    }
    Ok(())
}

fn print_banner(mode: ReplyMode, total: i64) {
    let is_tty = std::io::stderr().is_terminal()
        || std::env::var("FORCE_COLOR").is_ok_and(|v| !v.is_empty());
    let mode = match mode {
        ReplyMode::Message => "replying in place",
        ReplyMode::Thread => "replying in threads",
        ReplyMode::Ephemeral => "replying ephemerally",
    };
    if is_tty {
        eprintln!(
            "\x1b[1;32m==============================\n  KARMA BOT ONLINE\n  {mode}, {total} points on the books\n==============================\x1b[0m"
        );
    } else {
        eprintln!("KARMA BOT ONLINE: {mode}, {total} points on the books");
    }
}
