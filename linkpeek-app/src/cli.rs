use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use linkpeek_common::observability::{LogConfig, LogFormat};
use linkpeek_common::{ContentKind, ExtractMode, StatusPolicy};
use linkpeek_config::LinkpeekConfig;
use linkpeek_web::PreviewOptions;

#[derive(Parser, Debug)]
#[command(
    name = "linkpeek",
    about = "Fetch pages and print their Open Graph / HTML metadata as JSON",
    version
)]
pub struct Cli {
    /// Config file (defaults to <config dir>/linkpeek/linkpeek.yaml when present)
    #[arg(long, env = "LINKPEEK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Extraction mode: basic or direct-parse
    #[arg(long)]
    pub mode: Option<ExtractMode>,

    /// Kind to assume when a page does not declare one (e.g. article)
    #[arg(long)]
    pub default_kind: Option<ContentKind>,

    /// Treat non-2xx responses as errors instead of degraded records
    #[arg(long)]
    pub fail_on_status: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Mirror debug logs to stderr
    #[arg(long, short)]
    pub verbose: bool,

    /// Addresses to preview
    #[arg(required = true)]
    pub urls: Vec<String>,
}

impl Cli {
    /// Command-line flags win over the config file.
    pub fn preview_options(&self, cfg: &LinkpeekConfig) -> PreviewOptions {
        PreviewOptions {
            mode: self.mode.unwrap_or(cfg.extract.mode),
            default_kind: self.default_kind.unwrap_or(cfg.extract.default_kind),
            status_policy: if self.fail_on_status {
                StatusPolicy::Fail
            } else {
                cfg.extract.status_policy
            },
            timeout: Some(Duration::from_secs(
                self.timeout.unwrap_or(cfg.http.timeout_secs),
            )),
        }
    }

    pub fn log_config(&self, cfg: &LinkpeekConfig) -> LogConfig {
        let default_filter = if self.verbose {
            "debug".to_string()
        } else {
            cfg.logging.filter.clone().unwrap_or_else(|| "info".to_string())
        };
        LogConfig {
            app_name: "linkpeek",
            log_dir: cfg.logging.dir.clone(),
            emit_stderr: self.verbose || cfg.logging.stderr,
            format: if self.json_logs {
                LogFormat::Json
            } else {
                cfg.logging.format
            },
            default_filter,
        }
    }
}
