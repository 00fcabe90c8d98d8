use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::Parser;
use console::style;
use formcheck_core::{
    AnalysisClient, ConnectionStatus, FormCheckConfig, FormCheckError, FrameSink,
    ImageSequenceSource, NullSink, PoseService, ResponseOrdering, format_history_entry,
    render::ColorMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::{overlay_sink::OverlayFileSink, pipeline::start_session};

mod overlay_sink;
mod pipeline;
mod workers;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "formcheck")]
#[command(about = "Live shooting-form overlay and feedback from a pose-estimation backend")]
struct Cli {
    /// Directory of frames (png/jpg/bmp) replayed in name order as the camera
    frames: PathBuf,

    /// Analysis backend base URL (overrides config and FORMCHECK_BACKEND_URL)
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Milliseconds between analysis submissions, clamped to 200..=333
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// How long each replayed frame stays on screen, in milliseconds
    #[arg(long, default_value_t = 100)]
    frame_ms: u64,

    /// Maximum saved captures kept in history (0 = unbounded)
    #[arg(long)]
    history_cap: Option<usize>,

    /// Apply responses in arrival order instead of submission order
    #[arg(long)]
    arrival_order: bool,

    /// Config file (default: <config dir>/formcheck/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the overlay as PNG to this path whenever a newer analysis is drawn
    #[arg(long)]
    overlay_out: Option<PathBuf>,

    /// Color joints and bones by form quality instead of body side
    #[arg(long)]
    quality_colors: bool,

    /// Print session events as JSON lines
    #[arg(long)]
    json: bool,

    /// Debug logging for formcheck crates (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "formcheck=debug,formcheck_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<FormCheckConfig> {
    let mut config = FormCheckConfig::discover(cli.config.as_deref())?;
    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
    }
    if let Some(ms) = cli.interval_ms {
        config.analyze_interval_ms = ms;
    }
    if let Some(cap) = cli.history_cap {
        config.history_capacity = Some(cap);
    }
    if cli.arrival_order {
        config.response_ordering = ResponseOrdering::Arrival;
    }
    if cli.quality_colors {
        config.color_mode = ColorMode::FormQuality;
    }
    Ok(config)
}

fn print_help() {
    println!(
        "{}",
        style("[p] pause  [r] resume  [s] save  [h] history  [q] quit").dim()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    println!(
        "\n{}  {}\n",
        style("formcheck").cyan().bold(),
        style("Shooting Form Analyzer").dim()
    );

    let client = Arc::new(AnalysisClient::new(&config)?);

    let spinner = create_spinner(&format!("Checking backend at {}...", config.backend_url));
    let connection = client.check_health().await;
    let mark = match connection {
        ConnectionStatus::Connected => style("✓").green().bold(),
        _ => style("✗").red().bold(),
    };
    spinner.finish_with_message(format!("{} {}", mark, connection.describe()));

    let (sink, overlay_writer) = match cli.overlay_out.clone() {
        Some(path) => {
            let (sink, writer) = OverlayFileSink::spawn(path);
            (Box::new(sink) as Box<dyn FrameSink>, Some(writer))
        }
        None => (Box::new(NullSink) as Box<dyn FrameSink>, None),
    };
    let source = ImageSequenceSource::new(&cli.frames, Duration::from_millis(cli.frame_ms));
    let service: Arc<dyn PoseService> = client;

    let runtime = match start_session(&config, source, service, sink, cli.json).await {
        Ok(runtime) => runtime,
        Err(e) => {
            let hint = match e.downcast_ref::<FormCheckError>() {
                Some(FormCheckError::Device { .. }) => "Could not open the camera",
                _ => "Could not start the session",
            };
            eprintln!("{} {}: {}", style("Error:").red().bold(), hint, e);
            std::process::exit(1);
        }
    };
    runtime.scheduler.set_connection(connection);

    println!("{}", style("─".repeat(60)).dim());
    print_help();

    let started = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "p" => runtime.scheduler.pause(),
            "r" => runtime.scheduler.resume(),
            "s" => match runtime.scheduler.save().await {
                Some(_) => {}
                None => println!(
                    "{} {}",
                    style("·").dim(),
                    style("Nothing to save: pause on a detected pose first").dim()
                ),
            },
            "h" => {
                let before = runtime.scheduler.state().history.is_visible();
                runtime.scheduler.toggle_history();
                let mut rx = runtime.scheduler.subscribe();
                let _ = tokio::time::timeout(
                    Duration::from_millis(200),
                    rx.wait_for(|s| s.history.is_visible() != before),
                )
                .await;
                print_history(&runtime.scheduler.state());
            }
            "q" => break,
            "" => {}
            _ => print_help(),
        }
    }

    let state = runtime.scheduler.state();
    runtime.shutdown().await;
    if let Some(writer) = overlay_writer {
        let _ = writer.await;
    }

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{} {}  {} {}",
        style("Session:").dim(),
        style(format_duration(started.elapsed())).cyan().bold(),
        style("Saved:").dim(),
        style(state.history.len()).cyan().bold()
    );
    print_history(&state);

    Ok(())
}

fn print_history(state: &formcheck_core::SessionState) {
    if !state.history.is_visible() || state.history.is_empty() {
        return;
    }
    println!("\n{}", style("History").bold());
    for entry in state.history.entries() {
        println!("  {}", format_history_entry(entry));
    }
}
