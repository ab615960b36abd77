//! Command recognition, policy and collaborator interfaces for the karma bot.

pub mod chat;
pub mod classify;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod grammar;
pub mod model;
pub mod policy;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod text;

pub use chat::{ChatEvent, ChatService, MessageEvent, ReactionEvent, UserLookup};
pub use classify::{Classification, classify};
pub use dashboard::{DashboardProvider, NoDashboard, StaticDashboard};
pub use error::{
    ChatError, CommandError, ConfigError, DashboardError, LookupError, PolicyError, StoreError,
};
pub use grammar::Grammar;
pub use model::{KarmaOperation, Operands, ParsedCommand, ReplyContext, ReplyMode};
pub use policy::Policy;
pub use resolver::UserResolver;
pub use settings::{AliasTable, Blacklist, ReactjiPolicy};
pub use store::{KarmaStore, LeaderboardEntry};
