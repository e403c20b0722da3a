//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::AgentConfig;

/// Host compliance agent
///
/// Runs OpenSCAP scans on a schedule or on demand and delivers the
/// reports to a central collector. Flags override the config file.
#[derive(Parser, Debug)]
#[command(name = "compliance-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(
        short,
        long,
        env = "COMPLIANCE_AGENT_CONFIG",
        default_value = "/etc/compliance-agent/agent.toml"
    )]
    pub config: PathBuf,

    /// Collector base URL
    #[arg(long, env = "COMPLIANCE_API_URL")]
    pub collector_url: Option<String>,

    /// Bearer token for the collector
    #[arg(long, env = "COMPLIANCE_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Seconds between scheduled scans (0 = manual only)
    #[arg(long, env = "SCAN_INTERVAL")]
    pub scan_interval: Option<u64>,

    /// Default scan profile
    #[arg(long, env = "DEFAULT_PROFILE")]
    pub profile: Option<String>,

    /// Control surface port
    #[arg(short, long, env = "AGENT_PORT")]
    pub port: Option<u16>,

    /// SCAP datastream to scan with (auto-detected when unset)
    #[arg(long, env = "CONTENT_PATH")]
    pub content: Option<PathBuf>,

    /// Directory for raw scanner artifacts
    #[arg(long, env = "RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `compliance_agent=debug`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Overlay flags and environment onto a loaded config.
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(url) = &self.collector_url {
            config.collector_base_url.clone_from(url);
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone()).filter(|t| !t.is_empty());
        }
        if let Some(secs) = self.scan_interval {
            config.scan_interval_secs = secs;
        }
        if let Some(profile) = &self.profile {
            config.default_profile.clone_from(profile);
        }
        if let Some(port) = self.port {
            config.control_port = port;
        }
        if let Some(content) = &self.content {
            config.content_path = Some(content.clone());
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir.clone_from(dir);
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
        if self.log_json {
            config.log_json = true;
        }
    }
}
