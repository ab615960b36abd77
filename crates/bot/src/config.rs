use std::{fs, path::Path, sync::Arc};

use anyhow::{Context as _, Result};
use karma_core::{
    AliasTable, Blacklist, ConfigError, DashboardProvider, NoDashboard, Policy, ReactjiPolicy,
    ReplyMode, StaticDashboard, grammar::DEFAULT_BOT_NAMES, policy::DEFAULT_MAX_POINTS,
    settings::{DEFAULT_DOWNVOTE_REACTJI, DEFAULT_UPVOTE_REACTJI},
};
use serde::Deserialize;

use crate::{
    handler::{HandlerSettings, MAX_LEADERBOARD},
    quotes::{DEFAULT_QUOTE_CHANCE, QuoteBook},
};

/// Contents of `config.yaml`. Every key is optional.
#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_max_points")]
    pub max_points: u32,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
    #[serde(default = "default_bot_names")]
    pub bot_names: Vec<String>,
    #[serde(default = "enabled_true")]
    pub motivate: bool,
    #[serde(default = "enabled_true")]
    pub self_karma: bool,
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// `name++alias1++alias2` entries.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub reactji: ReactjiConfig,
    #[serde(default)]
    pub reply_mode: ReplyMode,
    #[serde(default = "default_quote_chance")]
    pub quote_chance: f64,
    #[serde(default)]
    pub quotes: QuotesConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReactjiConfig {
    #[serde(default = "enabled_true")]
    pub enabled: bool,
    #[serde(default = "default_upvote")]
    pub upvote: Vec<String>,
    #[serde(default = "default_downvote")]
    pub downvote: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QuotesConfig {
    #[serde(default)]
    pub good: Vec<String>,
    #[serde(default)]
    pub bad: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
}

const fn enabled_true() -> bool {
    true
}

const fn default_max_points() -> u32 {
    DEFAULT_MAX_POINTS
}

const fn default_leaderboard_limit() -> usize {
    10
}

const fn default_quote_chance() -> f64 {
    DEFAULT_QUOTE_CHANCE
}

fn default_bot_names() -> Vec<String> {
    DEFAULT_BOT_NAMES.iter().map(|n| (*n).to_owned()).collect()
}

fn default_upvote() -> Vec<String> {
    DEFAULT_UPVOTE_REACTJI.iter().map(|r| (*r).to_owned()).collect()
}

fn default_downvote() -> Vec<String> {
    DEFAULT_DOWNVOTE_REACTJI.iter().map(|r| (*r).to_owned()).collect()
}

impl Default for ReactjiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            upvote: default_upvote(),
            downvote: default_downvote(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            leaderboard_limit: default_leaderboard_limit(),
            bot_names: default_bot_names(),
            motivate: true,
            self_karma: true,
            blacklist: Vec::new(),
            aliases: Vec::new(),
            reactji: ReactjiConfig::default(),
            reply_mode: ReplyMode::default(),
            quote_chance: default_quote_chance(),
            quotes: QuotesConfig::default(),
            dashboard: DashboardConfig::default(),
            debug: false,
        }
    }
}

impl BotConfig {
    pub fn policy(&self) -> Policy {
        Policy {
            max_points: self.max_points,
            self_karma: self.self_karma,
            blacklist: self.blacklist.iter().collect::<Blacklist>(),
        }
    }

    pub fn aliases(&self) -> Result<AliasTable, ConfigError> {
        AliasTable::from_specs(&self.aliases)
    }

    pub fn reactji(&self) -> Result<ReactjiPolicy, ConfigError> {
        ReactjiPolicy::new(self.reactji.enabled, &self.reactji.upvote, &self.reactji.downvote)
    }

    pub fn dashboard(&self) -> Result<Arc<dyn DashboardProvider>, ConfigError> {
        match (&self.dashboard.url, self.dashboard.enabled) {
            (Some(url), true) => Ok(Arc::new(StaticDashboard::new(url)?)),
            (None, true) => Err(ConfigError::InvalidDashboardUrl(String::new())),
            (_, false) => Ok(Arc::new(NoDashboard)),
        }
    }

    pub fn quote_book(&self) -> QuoteBook {
        QuoteBook::new(
            self.quote_chance,
            self.quotes.good.clone(),
            self.quotes.bad.clone(),
        )
    }

    pub fn handler_settings(&self, debug: bool) -> HandlerSettings {
        HandlerSettings {
            motivate: self.motivate,
            leaderboard_limit: self.leaderboard_limit.clamp(1, MAX_LEADERBOARD),
            reply_mode: self.reply_mode,
            debug: debug || self.debug,
        }
    }
}

/// A missing file means every default.
pub fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        return Ok(BotConfig::default());
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    let cfg: BotConfig = serde_yaml::from_str(&yaml).context("parsing YAML config")?;
    Ok(cfg)
}
