//! ACE loop command-line entry point.
//!
//! One process runs one cycle:
//!
//! ```text
//! acelab --cycle daily  [--root DIR] [--config FILE] [--offline]
//! acelab --cycle weekly [--root DIR] [--config FILE] [--offline]
//! ```
//!
//! Environment: `GEMINI_API_KEY` (required unless `--offline`),
//! `TELEGRAM_BOT_TOKEN`/`TELEGRAM_CHAT_ID` (optional), `ACE_BUNDLE_DIR`
//! (bundle store location, default `<root>/../bundles`), `GITHUB_RUN_NUMBER`
//! (bundle key, optional).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{error, info};

use acelab_core::llm::{GeminiClient, LlmClient, RobustJsonDecoder, ScriptedClient};
use acelab_core::roles::{Curator, Executor, Generator, Reflector};
use acelab_core::sim::PriceReplaySimulator;
use acelab_runner::{
    AceConfig, DailyCycle, FixtureProvider, LocalDirStore, Notifier, NullNotifier, Paths,
    StateSynchronizer, TelegramNotifier, WeeklyCycle,
};

#[derive(Debug)]
struct Args {
    cycle: Cycle,
    root: PathBuf,
    config: Option<PathBuf>,
    offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Daily,
    Weekly,
}

fn parse_args() -> Result<Args> {
    let mut cycle = Cycle::Daily;
    let mut root = PathBuf::from(".");
    let mut config = None;
    let mut offline = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cycle" => {
                let value = args.next().context("--cycle needs a value")?;
                cycle = match value.as_str() {
                    "daily" => Cycle::Daily,
                    "weekly" => Cycle::Weekly,
                    other => bail!("unknown cycle '{other}' (expected daily|weekly)"),
                };
            }
            "--root" => root = PathBuf::from(args.next().context("--root needs a value")?),
            "--config" => config = Some(PathBuf::from(args.next().context("--config needs a value")?)),
            "--offline" => offline = true,
            "--help" | "-h" => {
                println!("usage: acelab [--cycle daily|weekly] [--root DIR] [--config FILE] [--offline]");
                std::process::exit(0);
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(Args { cycle, root, config, offline })
}

/// Scripted responses for credential-free demo runs.
#[derive(Debug, Clone, Copy)]
enum OfflineRole {
    Plan,
    Reflection,
}

fn llm_client(args: &Args, config: &AceConfig, role: OfflineRole) -> Result<Box<dyn LlmClient>> {
    if args.offline {
        let text = match role {
            OfflineRole::Plan => {
                r#"{"bias": "neutral", "entry_zone": [],
                    "rationale": "offline demo run; no model available",
                    "playbook_entries_used": [], "confidence": "low"}"#
            }
            OfflineRole::Reflection => {
                r#"{"insights": [], "market_regime_notes": "offline demo run"}"#
            }
        };
        return Ok(Box::new(ScriptedClient::with_texts(vec![text])));
    }
    let api_key = std::env::var("GEMINI_API_KEY")
        .context("GEMINI_API_KEY not set (use --offline for a credential-free demo)")?;
    Ok(Box::new(GeminiClient::new(
        api_key,
        config.llm.model.clone(),
        config.llm_timeout(),
    )))
}

fn notifier() -> Box<dyn Notifier> {
    match (std::env::var("TELEGRAM_BOT_TOKEN"), std::env::var("TELEGRAM_CHAT_ID")) {
        (Ok(token), Ok(chat_id)) => Box::new(TelegramNotifier::new(token, chat_id)),
        _ => {
            info!("telegram not configured; notifications disabled");
            Box::new(NullNotifier)
        }
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => AceConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AceConfig::default(),
    };

    let now = Utc::now();
    let today = now.date_naive();
    let paths = Paths::new(&args.root);

    let bundle_dir = std::env::var("ACE_BUNDLE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| args.root.join("..").join("bundles"));
    let run_number = std::env::var("GITHUB_RUN_NUMBER")
        .ok()
        .and_then(|v| v.parse().ok());

    let sync = StateSynchronizer::new(
        Box::new(LocalDirStore::new(bundle_dir)),
        paths.clone(),
        config.state.retention_days,
        run_number,
    );

    let daily = DailyCycle {
        session: config.session,
        pair: config.instrument.pair.clone(),
        generator: Generator::new(
            llm_client(&args, &config, OfflineRole::Plan)?,
            RobustJsonDecoder::new(Some(paths.debug_dir(today))),
            config.generation_config(),
        ),
        executor: Executor::new(PriceReplaySimulator::new(config.simulator_config())),
        market: Box::new(FixtureProvider::new(args.root.join("market_fixtures"))),
        notifier: notifier(),
        sync,
        paths: paths.clone(),
    };

    match args.cycle {
        Cycle::Daily => {
            let outcome = daily.run(now)?;
            info!(
                bias = ?outcome.plan.bias,
                outcome = ?outcome.trade_log.execution.outcome,
                events = outcome.events.len(),
                bundle = %outcome.bundle_key,
                "daily cycle finished"
            );
        }
        Cycle::Weekly => {
            let weekly = WeeklyCycle {
                reflector: Reflector::new(
                    llm_client(&args, &config, OfflineRole::Reflection)?,
                    RobustJsonDecoder::new(Some(paths.debug_dir(today))),
                    config.reflector_config(),
                ),
                curator: Curator::new(config.prune_thresholds()),
                daily,
            };
            let outcome = weekly.run(now)?;
            info!(
                version = %outcome.playbook_version,
                insights = outcome.report.insights.len(),
                events = outcome.events.len(),
                bundle = %outcome.bundle_key,
                "weekly cycle finished"
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Non-zero exit so the scheduler resumes from the last good
            // bundle on the next run.
            error!(error = ?e, "cycle failed");
            ExitCode::FAILURE
        }
    }
}
