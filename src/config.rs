use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

pub const LOG_ENV: &str = "LAPKESD_LOG";
pub const WORKSPACE_ENV: &str = "LAPKESD_WORKSPACE";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
}

impl DaemonConfig {
    /// Reads the process environment, after loading a `.env` file if present.
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            log_filter: env::var(LOG_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
            workspace: env::var_os(WORKSPACE_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}
