use std::sync::Arc;

use tracing::debug;

use crate::{chat::UserLookup, error::LookupError, grammar::Grammar, settings::AliasTable};

/// Turns user tokens into canonical lowercase names.
#[derive(Clone)]
pub struct UserResolver {
    grammar: Arc<Grammar>,
    aliases: Arc<AliasTable>,
    lookup: Arc<dyn UserLookup>,
}

impl std::fmt::Debug for UserResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserResolver")
            .field("aliases", &self.aliases.len())
            .finish_non_exhaustive()
    }
}

impl UserResolver {
    pub fn new(grammar: Arc<Grammar>, aliases: Arc<AliasTable>, lookup: Arc<dyn UserLookup>) -> Self {
        Self {
            grammar,
            aliases,
            lookup,
        }
    }

    /// Mentions are looked up on the platform, bare names are taken as-is.
    /// The result is lowercased and then aliased at most once.
    pub async fn resolve(&self, token: &str) -> Result<String, LookupError> {
        let token = token.trim().trim_start_matches('@');
        match self.grammar.mention_id(token) {
            Some(id) => self.resolve_id(id).await,
            None => Ok(self.canonical(token)),
        }
    }

    /// Resolves a raw platform user id.
    pub async fn resolve_id(&self, id: &str) -> Result<String, LookupError> {
        let name = self
            .lookup
            .lookup_user(id)
            .await
            .map_err(|source| LookupError {
                id: id.to_owned(),
                source,
            })?;
        let canonical = self.canonical(&name);
        debug!(id = %id, name = %canonical, "Resolved user");
        Ok(canonical)
    }

    fn canonical(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        self.aliases.apply(&lower).to_owned()
    }
}
