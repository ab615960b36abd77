use crate::{error::PolicyError, settings::Blacklist};

pub const DEFAULT_MAX_POINTS: u32 = 6;

/// Clamping and target rules applied to every karma operation.
#[derive(Debug, Clone)]
pub struct Policy {
    pub max_points: u32,
    pub self_karma: bool,
    pub blacklist: Blacklist,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            self_karma: true,
            blacklist: Blacklist::default(),
        }
    }
}

impl Policy {
    /// Signed delta for an operator run: one less than its length, capped
    /// at `max_points`, negative for `-` runs. Zero means "do nothing".
    #[must_use]
    pub fn compute_delta(&self, run: &str) -> i64 {
        let Some(first) = run.chars().next() else {
            return 0;
        };
        let len = u32::try_from(run.chars().count()).unwrap_or(u32::MAX);
        let magnitude = i64::from(len.saturating_sub(1).min(self.max_points));
        if first == '-' { -magnitude } else { magnitude }
    }

    /// Rejects blacklisted targets and, unless allowed, self-karma.
    pub fn check_target(&self, from: &str, to: &str) -> Result<(), PolicyError> {
        if self.blacklist.contains(to) {
            return Err(PolicyError::Blacklisted(to.to_owned()));
        }
        if !self.self_karma && from == to {
            return Err(PolicyError::SelfKarmaDisallowed);
        }
        Ok(())
    }
}
