//! fperf Sandbox - Main Entry Point
//!
//! Usage: `fperf-sandbox [PAGE_JSON] [--config CONFIG_JSON]`
//!
//! Submits one page (read from `PAGE_JSON`, or a built-in demo page), runs it
//! through the render pipeline, prints its accessibility issues and the
//! samples the engine recorded.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use fperf_engine::dom::{Node, Page};
use fperf_engine::{Config, Engine};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    page: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file path")?;
                parsed.config = Some(path.into());
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ if parsed.page.is_none() => parsed.page = Some(PathBuf::from(&arg)),
            _ => bail!("unexpected argument {arg}"),
        }
    }

    Ok(parsed)
}

fn demo_page() -> Page {
    Page::new("https://example.com").with_root(
        Node::new("div")
            .with_id("root")
            .with_child(Node::new("img").with_id("hero-image")),
    )
}

fn load_page(path: Option<&PathBuf>) -> Result<Page> {
    let Some(path) = path else {
        return Ok(demo_page());
    };
    let json = fs::read_to_string(path).with_context(|| format!("reading page {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing page {}", path.display()))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    Config::from_json_str(&json).with_context(|| format!("loading config {}", path.display()))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(args.config.as_ref())?;
    let page = load_page(args.page.as_ref())?;

    let engine = Engine::new(config)?;
    engine.start()?;

    let page_id = engine.submit_page(page)?;
    tracing::info!(page_id = %page_id, "page submitted");
    engine.run_render_pipeline(&page_id)?;

    let issues = engine.analyze_accessibility(&page_id)?;
    println!("Accessibility issues for {page_id}: {}", issues.len());
    for issue in &issues {
        println!("  [{}] {} {}: {}", issue.severity, issue.code, issue.node_id, issue.message);
    }

    // Waits for the queued pipeline run
    engine.stop();

    println!("Metrics:");
    for sample in engine.export_metrics() {
        println!("  {:>10.3}ms  {} = {:.3}", sample.elapsed_ms, sample.name, sample.value);
    }

    Ok(())
}
