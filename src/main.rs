use anyhow::Result;
use camsight::analysis::prompts::is_known_category;
use camsight::analysis::{RequestStatus, SingleResult};
use camsight::camera::open_backend;
use camsight::config::CameraBackend;
use camsight::{CamsightApp, CamsightConfig, MediaDevices};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "camsight")]
#[command(about = "Camera snapshot analysis with a multimodal language model")]
#[command(version)]
#[command(long_about = "Captures still frames from a camera and sends them, together with \
category-specific prompts (emotion, gaze, accessories, ...), to a multimodal language model. \
Runs interactively by default; use --once or --describe for a single shot.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camsight.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// List the configured analysis categories and exit
    #[arg(long)]
    list_categories: bool,

    /// List capture devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Override the camera backend
    #[arg(long, value_name = "BACKEND", value_parser = ["synthetic", "v4l2"])]
    backend: Option<String>,

    /// Capture once, analyze the given categories and exit
    #[arg(long, requires = "categories")]
    once: bool,

    /// Category to analyze with --once (repeatable)
    #[arg(long = "category", value_name = "LABEL")]
    categories: Vec<String>,

    /// Capture once, print a generic description and exit
    #[arg(long, conflicts_with = "once")]
    describe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args)?;

    info!("Starting camsight v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match CamsightConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(backend) = args.backend.as_deref() {
        config.camera.backend = match backend {
            "v4l2" => CameraBackend::V4l2,
            _ => CameraBackend::Synthetic,
        };
    }

    match config.validate() {
        Ok(()) if args.validate_config => {
            info!("Configuration validation successful");
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    if args.list_categories {
        for (i, category) in config.analysis.categories.iter().enumerate() {
            let note = if is_known_category(category) {
                ""
            } else {
                " (generic prompt)"
            };
            println!("{}. {}{}", i + 1, category, note);
        }
        return Ok(());
    }

    if args.list_devices {
        let backend = open_backend(&config.camera)?;
        let devices = MediaDevices::enumerate(&*backend).await?;
        if devices.is_empty() {
            println!("No capture devices found");
        }
        for device in devices {
            let label = if device.label.is_empty() {
                "(label hidden until camera access is granted)"
            } else {
                device.label.as_str()
            };
            let facing = device
                .facing
                .map(|f| format!(" [{}]", f))
                .unwrap_or_default();
            println!("{}: {}{}", device.device_id, label, facing);
        }
        return Ok(());
    }

    let mut app = CamsightApp::new(config).map_err(|e| {
        error!("Failed to create app: {}", e);
        e
    })?;

    if args.once {
        return run_once(&mut app, &args.categories).await;
    }

    if args.describe {
        return match app.describe_once().await? {
            SingleResult::Described(text) => {
                println!("{}", text);
                Ok(())
            }
            SingleResult::Failed(message) => {
                eprintln!("✗ {}", message);
                std::process::exit(1);
            }
        };
    }

    let exit_code = app.run_interactive().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Camsight exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

async fn run_once(app: &mut CamsightApp, categories: &[String]) -> Result<()> {
    let report = match app.run_once(categories).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    for request in &report.requests {
        match (request.status, &request.result) {
            (RequestStatus::Succeeded, Some(outcome)) => {
                println!("{}: {}", request.category, outcome.as_text().unwrap_or_default())
            }
            _ => println!(
                "{}: failed: {}",
                request.category,
                request.error_message().unwrap_or("no result")
            ),
        }
    }

    if report.failed() > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camsight={}", log_level)));

    // Console output goes to stderr so it does not interleave with results
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "camsight.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Camsight Configuration File");
    println!("# This is the default configuration with all available options.");
    println!("# The API key is read from the variable named by analysis.api_key_env");
    println!("# unless analysis.api_key is set.");
    println!();
    println!("{}", CamsightConfig::default().to_toml()?);
    Ok(())
}
