use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use linkpeek_common::observability::init_logging;
use linkpeek_config::{LinkpeekConfig, LinkpeekConfigLoader, default_config_path};
use linkpeek_http::HttpClient;
use linkpeek_web::Previewer;
use serde_json::json;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    // 1) Load config (env wins over file, flags win over both)
    let cfg = load_config(&args)?;

    // 2) Logging
    let log_path = init_logging(args.log_config(&cfg))?;
    tracing::debug!(log_path = %log_path.display(), "linkpeek.start");

    // 3) Client + previewer
    let http = HttpClient::configured(
        Duration::from_secs(cfg.http.connect_timeout_secs),
        cfg.http.user_agent.as_deref(),
    )?
    .with_retries(cfg.http.retries);
    let previewer = Previewer::new(http).with_options(args.preview_options(&cfg));

    // 4) Ctrl-C cancels whatever is still in flight
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("linkpeek.interrupted");
            trigger.cancel();
        }
    });

    let results = previewer
        .preview_many(&args.urls, cfg.extract.concurrency, &cancel)
        .await;

    let mut failed = 0usize;
    for (url, result) in results {
        let value = match result {
            Ok(record) => serde_json::to_value(&record)?,
            Err(err) => {
                failed += 1;
                json!({ "url": url, "error": err.to_string() })
            }
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(args: &Cli) -> Result<LinkpeekConfig> {
    let loader = LinkpeekConfigLoader::new();
    let loader = match (&args.config, default_config_path()) {
        (Some(path), _) => loader.with_file(path),
        (None, Some(path)) => loader.with_optional_file(path),
        (None, None) => loader,
    };
    Ok(loader.load()?)
}
