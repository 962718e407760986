//! `archivist-runner` command line

use anyhow::Context;
use archivist_client::logging::{self, LogFormat};
use archivist_client::{Archivist, ArchivistConfig};
use archivist_runner::{RunReport, Story, StoryRunner};
use clap::Parser;
use std::path::PathBuf;

/// Run a YAML story of Archivist operations against one tenant
#[derive(Debug, Parser)]
#[command(name = "archivist-runner", version, about)]
struct Cli {
    /// Story file
    story: PathBuf,

    /// TOML configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service URL, without trailing slash
    #[arg(long, env = "ARCHIVIST_URL")]
    url: Option<String>,

    /// File holding the bearer token
    #[arg(long, env = "ARCHIVIST_AUTH_TOKEN_FILE")]
    auth_token_file: Option<PathBuf>,

    /// Confirmation budget in seconds
    #[arg(long, env = "ARCHIVIST_MAX_TIME")]
    max_time: Option<f64>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Log filter, e.g. `info` or `archivist_client=debug`
    #[arg(long, env = "ARCHIVIST_LOG")]
    log: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the whole run report as JSON when done
    #[arg(long)]
    report: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<ArchivistConfig> {
    let mut config = match (&cli.config, &cli.url) {
        (Some(path), _) => ArchivistConfig::from_file(path)?,
        (None, Some(url)) => ArchivistConfig::new(url.clone()),
        (None, None) => anyhow::bail!("either --config or --url (ARCHIVIST_URL) is required"),
    };
    if let Some(url) = &cli.url {
        config.url.clone_from(url);
    }
    if let Some(path) = &cli.auth_token_file {
        config.auth_token_file = Some(path.clone());
    }
    if let Some(max_time) = cli.max_time {
        config.max_time_secs = max_time;
    }
    if cli.insecure {
        config.verify_tls = false;
    }
    if cli.log.is_some() {
        config.log_filter.clone_from(&cli.log);
    }
    config.validate()?;
    Ok(config)
}

fn print_responses(report: &RunReport) -> anyhow::Result<()> {
    for outcome in report.outcomes.iter().filter(|o| o.print_response) {
        println!(
            "step {} {}:\n{}",
            outcome.number,
            outcome.action,
            serde_json::to_string_pretty(&outcome.response)?
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logging::init(config.log_filter.as_deref(), format);

    let story = Story::from_file(&cli.story)
        .with_context(|| format!("loading story {}", cli.story.display()))?;
    let archivist = Archivist::from_config(config).context("connecting to archivist")?;

    let report = StoryRunner::new(archivist).run(&story).await?;
    print_responses(&report)?;
    if cli.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    tracing::info!(
        steps = report.outcomes.len(),
        deleted = report.deleted.len(),
        "story complete"
    );
    Ok(())
}
