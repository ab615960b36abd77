use async_trait::async_trait;
use serde::Serialize;

use crate::{error::StoreError, model::KarmaOperation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub points: i64,
}

/// Persistence for karma operations.
///
/// Implementations must be safe to call from many tasks at once; callers do
/// not serialize writes.
#[async_trait]
pub trait KarmaStore: Send + Sync {
    async fn insert_operation(&self, op: &KarmaOperation) -> Result<(), StoreError>;

    /// Sum of all deltas received by `name`. [`StoreError::NoSuchUser`] when
    /// `name` never received any.
    async fn user_points(&self, name: &str) -> Result<i64, StoreError>;

    /// Users ordered by points, highest first, at most `limit` of them.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;

    /// A random past operation received by `name`.
    async fn throwback(&self, name: &str) -> Result<KarmaOperation, StoreError>;

    /// Sum of the absolute value of every delta ever recorded.
    async fn total_points(&self) -> Result<i64, StoreError>;
}
