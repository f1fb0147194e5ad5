use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use sanitize_filename::sanitize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

use tug::core::engine::{DownloadRequest, Engine};
use tug::core::model::{ProgressSnapshot, Resource};
use tug::http::driver::HttpDriver;
use tug::http::DriverContext;
use tug::ui::bridge::{EventBridge, STATUS_DOWNLOADING};
use tug::ui::gate::completion_gate;
use tug::ui::notify::DesktopNotifier;
use tug::ui::render::Renderer;

fn build_cli() -> Command {
    Command::new("tug")
        .about("Download a file with a live progress bar and a desktop notification")
        .arg(
            Arg::new("url")
                .help("Link to download")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Output directory")
                .default_value("./downloads")
                .num_args(1),
        )
        .arg(
            Arg::new("connections")
                .long("connections")
                .help("Max concurrent connections for ranged transfers")
                .default_value("6")
                .num_args(1),
        )
        .arg(
            Arg::new("chunk_mb")
                .long("chunk-mb")
                .help("Chunk size in MB (for HTTP range)")
                .default_value("8")
                .num_args(1),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .help("Extra HTTP header (repeatable), e.g. --header 'Authorization: Bearer xxx'")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("user_agent")
                .long("user-agent")
                .help("HTTP User-Agent")
                .num_args(1),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help("HTTP timeout in seconds")
                .default_value("60")
                .num_args(1),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .help("HTTP retries for transient errors")
                .default_value("2")
                .num_args(1),
        )
        .arg(
            Arg::new("retry_backoff_ms")
                .long("retry-backoff-ms")
                .help("Retry backoff base in milliseconds")
                .default_value("400")
                .num_args(1),
        )
        .arg(
            Arg::new("notify_icon")
                .long("notify-icon")
                .help("Icon file for the completion notification")
                .num_args(1),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they cannot corrupt the in-place progress line.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();

    // Everything up to starting the engine is setup: any error here aborts
    // with a non-zero exit before a single progress frame is drawn.
    let url = Url::parse(matches.get_one::<String>("url").unwrap())?;
    let out_dir: PathBuf = matches.get_one::<String>("out_dir").unwrap().into();
    let connections: usize = matches.get_one::<String>("connections").unwrap().parse()?;
    let chunk_mb: u64 = matches.get_one::<String>("chunk_mb").unwrap().parse()?;
    let notify_icon = matches.get_one::<String>("notify_icon").map(PathBuf::from);

    let mut ctx = DriverContext::default();
    if let Some(ua) = matches.get_one::<String>("user_agent") {
        ctx.user_agent = ua.clone();
    }
    ctx.timeout_secs = matches.get_one::<String>("timeout_secs").unwrap().parse()?;
    ctx.retries = matches.get_one::<String>("retries").unwrap().parse()?;
    ctx.retry_backoff_ms = matches
        .get_one::<String>("retry_backoff_ms")
        .unwrap()
        .parse()?;

    let mut headers = HashMap::new();
    if let Some(values) = matches.get_many::<String>("header") {
        for h in values {
            let (k, v) = h
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("invalid header format: {}", h))?;
            headers.insert(k.trim().to_string(), v.trim().to_string());
        }
    }

    tokio::fs::create_dir_all(&out_dir).await?;
    let target_path = out_dir.join(target_filename(&url));

    let (events_tx, events_rx) = mpsc::channel(64);
    let (signal, gate) = completion_gate();

    // Idle frame before the engine can produce its first event, so the
    // terminal shows feedback immediately.
    let mut renderer = Renderer::stdout();
    renderer.render(STATUS_DOWNLOADING, &ProgressSnapshot::idle())?;

    let bridge = EventBridge::new(
        renderer,
        Box::new(DesktopNotifier::new()),
        signal,
        target_path.clone(),
        notify_icon,
        "complete",
        "fail",
    );
    let bridge_task = tokio::spawn(bridge.run(events_rx));

    let engine = Engine::new(
        Arc::new(HttpDriver::new()),
        connections,
        chunk_mb * 1024 * 1024,
        ctx,
        events_tx,
    );
    let _ = engine.start(DownloadRequest {
        resource: Resource { uri: url.to_string(), headers },
        target_path,
    });

    // Download-time failures were already reported through the fail line
    // and the notification; they still exit 0. Only setup errors above
    // abort with a non-zero status.
    let _ = gate.wait().await;
    let _ = bridge_task.await;

    Ok(())
}

fn target_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|s| s.last())
        .filter(|s| !s.is_empty())
        .map(sanitize)
        .unwrap_or_else(|| "download.bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_comes_from_the_last_path_segment() {
        let url = Url::parse("https://example.com/files/archive.tar.gz?token=x").unwrap();
        assert_eq!(target_filename(&url), "archive.tar.gz");
    }

    #[test]
    fn filename_falls_back_when_the_path_is_empty() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(target_filename(&url), "download.bin");
    }

    #[test]
    fn filename_ignores_query_and_trailing_slash() {
        let url = Url::parse("https://example.com/dl/file.bin?sig=abc#frag").unwrap();
        assert_eq!(target_filename(&url), "file.bin");

        let url = Url::parse("https://example.com/files/").unwrap();
        assert_eq!(target_filename(&url), "download.bin");
    }

    #[test]
    fn cli_parses_defaults() {
        let matches = build_cli().get_matches_from(["tug", "https://example.com/f.bin"]);
        assert_eq!(
            matches.get_one::<String>("out_dir").map(String::as_str),
            Some("./downloads")
        );
        assert_eq!(
            matches.get_one::<String>("connections").map(String::as_str),
            Some("6")
        );
    }
}
