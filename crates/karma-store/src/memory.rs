use std::collections::HashMap;

use async_trait::async_trait;
use karma_core::{KarmaOperation, KarmaStore, LeaderboardEntry, StoreError};
use rand::seq::SliceRandom as _;
use tokio::sync::RwLock;

/// Keeps every operation in memory. Used by tests and for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ops: RwLock<Vec<KarmaOperation>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation inserted so far, oldest first.
    pub async fn operations(&self) -> Vec<KarmaOperation> {
        self.ops.read().await.clone()
    }
}

#[async_trait]
impl KarmaStore for MemoryStore {
    async fn insert_operation(&self, op: &KarmaOperation) -> Result<(), StoreError> {
        self.ops.write().await.push(op.clone());
        Ok(())
    }

    async fn user_points(&self, name: &str) -> Result<i64, StoreError> {
        let ops = self.ops.read().await;
        let mut received = ops.iter().filter(|op| op.to == name).peekable();
        if received.peek().is_none() {
            return Err(StoreError::NoSuchUser(name.to_owned()));
        }
        Ok(received.map(|op| op.delta).sum())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let ops = self.ops.read().await;
        let mut totals: HashMap<&str, i64> = HashMap::new();
        for op in ops.iter() {
            *totals.entry(op.to.as_str()).or_default() += op.delta;
        }
        let mut entries: Vec<LeaderboardEntry> = totals
            .into_iter()
            .map(|(name, points)| LeaderboardEntry {
                name: name.to_owned(),
                points,
            })
            .collect();
        entries.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn throwback(&self, name: &str) -> Result<KarmaOperation, StoreError> {
        let ops = self.ops.read().await;
        let received: Vec<&KarmaOperation> = ops.iter().filter(|op| op.to == name).collect();
        let picked = {
            let mut rng = rand::thread_rng();
            received.choose(&mut rng).map(|op| (*op).clone())
        };
        picked.ok_or_else(|| StoreError::NoSuchUser(name.to_owned()))
    }

    async fn total_points(&self) -> Result<i64, StoreError> {
        Ok(self.ops.read().await.iter().map(|op| op.delta.abs()).sum())
    }
}
