use url::Url;

use crate::error::{ConfigError, DashboardError};

/// Source of links to the web leaderboard.
pub trait DashboardProvider: Send + Sync {
    /// Full url for `path`, or an empty string when no dashboard exists.
    fn url(&self, path: &str) -> Result<String, DashboardError>;
}

/// Used when the dashboard is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDashboard;

impl DashboardProvider for NoDashboard {
    fn url(&self, _path: &str) -> Result<String, DashboardError> {
        Ok(String::new())
    }
}

/// Dashboard served at a fixed base url.
#[derive(Debug, Clone)]
pub struct StaticDashboard {
    base: Url,
}

impl StaticDashboard {
    /// `base` must be an absolute http(s) url with a host.
    pub fn new(base: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDashboardUrl(base.to_owned());
        let mut url = Url::parse(base.trim()).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
            return Err(invalid());
        }
        // Joined paths land under the base path, not beside it.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self { base: url })
    }
}

impl DashboardProvider for StaticDashboard {
    fn url(&self, path: &str) -> Result<String, DashboardError> {
        if path.contains(char::is_whitespace) {
            return Err(DashboardError(format!("bad path {path:?}")));
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Ok(self.base.as_str().trim_end_matches('/').to_owned());
        }
        self.base
            .join(path)
            .map(String::from)
            .map_err(|e| DashboardError(format!("bad path {path:?}: {e}")))
    }
}
