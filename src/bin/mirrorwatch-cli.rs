use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};

use mirrorwatch_lib::input_validation::{parse_interval_minutes, parse_path_argument};
use mirrorwatch_lib::{AppConfig, BackupMonitor, ChannelSink, SinkMessage, SyncEngine};

#[derive(Parser)]
#[command(name = "mirrorwatch-cli")]
#[command(about = "Timed backup and live watch of a directory tree", long_about = None)]
struct Cli {
    /// YAML settings file
    #[arg(short, long, default_value = "mirrorwatch.yaml")]
    config: PathBuf,

    #[arg(short, long)]
    source: Option<String>,

    #[arg(short, long)]
    target: Option<String>,

    /// Backup interval in minutes
    #[arg(short, long)]
    interval: Option<String>,

    /// Show what would be copied and exit
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Run one backup pass and exit
    #[arg(long)]
    once: bool,

    /// Print the pass report as JSON (with --once)
    #[arg(long)]
    json: bool,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(source) = &cli.source {
        config.source = Some(parse_path_argument(source)?);
    }
    if let Some(target) = &cli.target {
        config.destination = Some(parse_path_argument(target)?);
    }
    if let Some(interval) = &cli.interval {
        config.interval_minutes = parse_interval_minutes(interval)?;
    }
    Ok(config)
}

/// Drains the sink on its own task: lines above the bars, gauge into the
/// disk bar.
fn spawn_printer(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<SinkMessage>,
    multi: MultiProgress,
    disk_bar: ProgressBar,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                SinkMessage::Line(line) => {
                    let _ = multi.println(line);
                }
                SinkMessage::Progress(percent) => disk_bar.set_position(percent as u64),
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    if cli.save_config {
        config.save(&cli.config)?;
    }

    let (Some(source), Some(target)) = (config.source.clone(), config.destination.clone()) else {
        anyhow::bail!("Both --source and --target are required (or set them in {:?})", cli.config);
    };

    if cli.dry_run {
        let engine = SyncEngine::new(source.clone(), target.clone());
        let dry_run = engine.dry_run().await?;
        println!("🔍 Dry-run: {source:?} → {target:?}");
        println!("   Files in source: {}", dry_run.total_files);
        println!("   Unchanged: {}", dry_run.files_unchanged);
        println!("   Bytes to copy: {}", dry_run.bytes_to_copy);
        for action in &dry_run.planned {
            println!("   {} {:?}", action.decision.label(), action.source);
        }
        if !dry_run.failures.is_empty() {
            println!("   Could not compare: {}", dry_run.failures.len());
            for failure in &dry_run.failures {
                println!("   ❌ {:?}: {}", failure.path, failure.message);
            }
        }
        return Ok(());
    }

    let multi = MultiProgress::new();
    let disk_bar = multi.add(ProgressBar::new(100));
    disk_bar.set_style(
        ProgressStyle::default_bar()
            .template("Disk usage [{bar:40.cyan/blue}] {pos}%")?
            .progress_chars("#>-"),
    );
    let countdown = multi.add(ProgressBar::new_spinner());
    countdown.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);

    let (sink, rx) = ChannelSink::new();
    let printer = spawn_printer(rx, multi.clone(), disk_bar.clone());
    let monitor = Arc::new(BackupMonitor::from_config(&config, Arc::new(sink))?);

    // Disk gauge failures were already reported through the sink
    let _ = monitor.select_destination();

    if cli.once {
        let report = monitor.backup_now().await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        drop(monitor);
        let _ = printer.await;
        return Ok(());
    }

    if monitor.start_monitoring().is_err() {
        drop(monitor);
        let _ = printer.await;
        std::process::exit(1);
    }

    let _ = multi.println("Commands: now | interval <minutes> | start | stop | quit");
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut refresh = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = refresh.tick() => {
                countdown.set_message(format!("Next backup in: {}", monitor.countdown_text()));
                countdown.tick();
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                let mut parts = line.trim().splitn(2, ' ');
                match (parts.next().unwrap_or(""), parts.next()) {
                    ("now", _) => {
                        let monitor = Arc::clone(&monitor);
                        tokio::spawn(async move {
                            let _ = monitor.backup_now().await;
                        });
                    }
                    ("interval", Some(minutes)) => {
                        let _ = monitor.update_interval_text(minutes);
                    }
                    ("start", _) => {
                        let _ = monitor.start_monitoring();
                    }
                    ("stop", _) => monitor.stop_monitoring(),
                    ("quit", _) | ("exit", _) => break,
                    ("", _) => {}
                    (other, _) => {
                        let _ = multi.println(format!("Unknown command: {other}"));
                    }
                }
            }
        }
    }

    countdown.finish_and_clear();
    monitor.stop_monitoring();
    drop(monitor);
    disk_bar.finish();
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
    Ok(())
}
