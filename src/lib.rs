//! # VimiOTP command line host
//!
//! Wires the `vimi-otp` engine to the filesystem and the terminal:
//! configuration, logging, a JSON credentials file, and the subcommands.

pub mod cli;
pub mod config;
pub mod logger;
pub mod render;
pub mod scan;
pub mod storage;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use vimi_otp::otp::scan::ScanOutcome;
use vimi_otp::otp::scheduler::ChannelSink;
use vimi_otp::otp::{OtpService, OtpServiceState, SystemClock};

pub use cli::{Cli, Command};
pub use config::AppConfig;
pub use storage::JsonFilePersistence;

/// Resolve the data directory and load its settings.
pub fn load_settings(data_dir: Option<PathBuf>) -> anyhow::Result<(PathBuf, AppConfig)> {
    let data_dir = config::resolve_data_dir(data_dir)?;
    let cfg = AppConfig::load(&data_dir)?;
    Ok((data_dir, cfg))
}

/// Build the service over the credentials file in `data_dir`.
pub fn open_service(data_dir: &Path, cfg: &AppConfig) -> anyhow::Result<OtpServiceState> {
    OtpService::with_settings(
        Box::new(JsonFilePersistence::in_dir(data_dir)),
        cfg.period,
        cfg.digits,
        Arc::new(SystemClock),
    )
    .with_context(|| format!("failed to open credentials in {}", data_dir.display()))
}

/// Run one subcommand against `state`, writing user-facing output to `out`.
pub async fn execute(command: Command, state: &OtpServiceState, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Command::List => {
            let svc = state.lock().await;
            write!(out, "{}", render::render_list(svc.list()))?;
        }
        Command::Add { name, secret, issuer } => {
            let cred = state.lock().await.add(&name, &secret, &issuer)?;
            writeln!(out, "Added {} ({})", cred.display_name(), cred.id)?;
        }
        Command::Delete { id } => {
            if state.lock().await.delete(&id) {
                writeln!(out, "Deleted {}", id)?;
            } else {
                writeln!(out, "No account with id {}", id)?;
            }
        }
        Command::Codes => {
            let codes = state.lock().await.current_codes();
            if codes.is_empty() {
                writeln!(out, "No accounts yet.")?;
            } else {
                write!(out, "{}", render::render_codes(&codes))?;
            }
        }
        Command::Watch { ticks } => watch(state, ticks, out).await?,
        Command::Export { out: path } => {
            let bundle = state.lock().await.export()?;
            let path = path.unwrap_or_else(|| PathBuf::from(&bundle.file_name));
            std::fs::write(&path, &bundle.json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "Exported to {}", path.display())?;
        }
        Command::Import { path } => {
            let json = read_file(&path)?;
            let summary = state.lock().await.import_backup(&json)?;
            writeln!(
                out,
                "Imported {} account(s); skipped {} duplicate(s) and {} invalid",
                summary.added, summary.skipped_duplicates, summary.skipped_invalid
            )?;
        }
        Command::Scan { input, accept, all } => {
            let source = scan::DecodedLinesSource::new(scan::LinesInput::from_arg(&input));
            let outcome = OtpService::scan(state, &source, &scan::PassthroughDecoder).await?;
            match outcome {
                ScanOutcome::Added { credential } => {
                    writeln!(out, "Added {}", credential.display_name())?;
                }
                ScanOutcome::Choose { mut candidates } => {
                    writeln!(out, "Found {} codes:", candidates.len())?;
                    for (i, item) in candidates.items.iter().enumerate() {
                        writeln!(out, "  {}. {}", i + 1, item.candidate.display_name())?;
                    }
                    let picks: Vec<usize> = if all {
                        (1..=candidates.len()).collect()
                    } else {
                        accept
                    };
                    if let Some(&bad) = picks.iter().find(|&&n| n == 0 || n > candidates.len()) {
                        bail!("no code at position {} (choose 1 to {})", bad, candidates.len());
                    }
                    let mut svc = state.lock().await;
                    for n in picks {
                        match svc.accept_scanned(&mut candidates, n - 1)? {
                            Some(cred) => writeln!(out, "Added {}", cred.display_name())?,
                            None => writeln!(out, "Already added #{}", n)?,
                        }
                    }
                }
            }
        }
        Command::AcceptUri { uri } => {
            let cred = state.lock().await.accept_uri(&uri)?;
            writeln!(out, "Added {}", cred.display_name())?;
        }
    }
    Ok(())
}

/// Print a frame every second until `ticks` frames were shown or Ctrl-C.
async fn watch(state: &OtpServiceState, ticks: Option<u64>, out: &mut dyn Write) -> anyhow::Result<()> {
    let scheduler = state.lock().await.scheduler()?;
    let (sink, mut rx) = ChannelSink::new();
    let handle = scheduler.spawn(state.clone(), Arc::new(sink));

    let mut shown = 0u64;
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                write!(out, "{}", render::render_frame(&frame))?;
                out.flush()?;
                shown += 1;
                if ticks.is_some_and(|n| shown >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }
    handle.stop().await;
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Full program: logging, service, then the subcommand.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        data_dir,
        verbose,
        quiet,
        json_logs,
        command,
    } = cli;
    let (data_dir, cfg) = load_settings(data_dir)?;
    logger::init(&cfg.log_level, verbose, quiet, json_logs || cfg.log_json)?;
    tracing::debug!("Using data directory {}", data_dir.display());
    let state = open_service(&data_dir, &cfg)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(command, &state, &mut out).await
}
