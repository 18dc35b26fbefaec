use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::*;
use portprobe::{
    output::{OutputConfig, OutputFormat, OutputManager, ProgressDisplay},
    utils::{adjust_ulimit_size, resolve_target, Logger, DEFAULT_LOG_FILE},
    CancellationToken, FileConfig, PortRange, ScanEngine, ScanError,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_START_PORT: u16 = 1;
const DEFAULT_END_PORT: u16 = 1024;

fn build_cli() -> Command {
    Command::new("portprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-threaded TCP port scanner")
        .arg(
            Arg::new("host")
                .help("Target hostname or IP address (default: localhost)")
                .index(1),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .value_parser(value_parser!(u16))
                .help("Start port (default: 1)"),
        )
        .arg(
            Arg::new("end")
                .long("end")
                .value_parser(value_parser!(u16))
                .help("End port (default: 1024)"),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("RANGE")
                .help("Port range as N or N-M")
                .conflicts_with_all(["start", "end"]),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .visible_alias("concurrency")
                .value_parser(value_parser!(usize))
                .help("Number of concurrent probes (default: 100)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(f64))
                .help("Socket timeout in seconds (default: 0.5)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file (default: ~/.portprobe.toml)"),
        )
        .arg(
            Arg::new("format")
                .short('o')
                .long("format")
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Summary format"),
        )
        .arg(
            Arg::new("output-file")
                .long("output-file")
                .value_name("FILE")
                .help("Write the summary to FILE instead of stdout"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity and show per-outcome counts"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_LOG_FILE)
                .help("Append log records to FILE"),
        )
        .arg(
            Arg::new("no-log-file")
                .long("no-log-file")
                .action(ArgAction::SetTrue)
                .help("Only log to stderr"),
        )
        .arg(
            Arg::new("ulimit")
                .long("ulimit")
                .value_parser(value_parser!(u64))
                .help("Raise the open file limit before scanning"),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .action(ArgAction::SetTrue)
                .help("Hide the progress bar"),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .action(ArgAction::SetTrue)
                .help("Disable colored output"),
        )
}

/// Convert a timeout in seconds to milliseconds; non-positive input maps to 0
fn timeout_millis(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    ((secs * 1000.0).round() as u64).max(1)
}

/// The bar is drawn only when stderr carries no per-port log lines
fn shows_progress(format: OutputFormat, no_progress: bool, verbosity: u8) -> bool {
    format == OutputFormat::Text && !no_progress && verbosity == 0
}

fn print_banner(host: &str, target: IpAddr, range: PortRange) {
    let rule = "-".repeat(50);
    println!("{}", rule);
    println!("{} {} ({})", "Scanning Target:".bright_yellow().bold(), target.to_string().bright_cyan(), host);
    println!("{}  {} to {}", "Scanning Ports:".bright_yellow().bold(), range.start(), range.end());
    println!("{}    {}", "Time Started:".bright_yellow().bold(), chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}", rule);
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    if matches.get_flag("no-color") {
        colored::control::set_override(false);
    }

    let log_file = if matches.get_flag("no-log-file") {
        None
    } else {
        matches.get_one::<PathBuf>("log-file").cloned()
    };
    Logger::init(Logger::level_from_verbosity(matches.get_count("verbose")), log_file.as_deref())
        .context("Failed to initialize logging")?;

    // Precedence: command line, then config file, then built-in defaults.
    let file_config = match matches.get_one::<PathBuf>("config") {
        Some(path) => FileConfig::from_toml_file(path)?,
        None => FileConfig::load_default_config()?,
    };

    let mut config = file_config.probe_config();
    if let Some(&threads) = matches.get_one::<usize>("threads") {
        config = config.with_concurrency(threads);
    }
    if let Some(&secs) = matches.get_one::<f64>("timeout") {
        config = config.with_timeout(timeout_millis(secs));
    }
    config.validate()?;

    let range = match matches.get_one::<String>("ports") {
        Some(ports) => ports.parse::<PortRange>()?,
        None => PortRange::new(
            matches
                .get_one::<u16>("start")
                .copied()
                .or(file_config.start)
                .unwrap_or(DEFAULT_START_PORT),
            matches
                .get_one::<u16>("end")
                .copied()
                .or(file_config.end)
                .unwrap_or(DEFAULT_END_PORT),
        )?,
    };

    let host = match matches.get_one::<String>("host") {
        Some(host) => host.clone(),
        None => {
            println!("{}", "=".repeat(40));
            println!("{}", " >> DEFAULT MODE: Using localhost".bright_blue());
            println!("{}", "=".repeat(40));
            DEFAULT_HOST.to_string()
        }
    };

    let target = resolve_target(&host)?;
    log::info!("Resolved {} to {}", host, target);

    if let Some(soft_limit) = adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied()) {
        if soft_limit < config.concurrency as u64 {
            log::warn!(
                "Open file limit {} is below concurrency {}; some probes may fail with resource errors",
                soft_limit,
                config.concurrency
            );
        }
    }

    let format: OutputFormat = matches
        .get_one::<String>("format")
        .map(|f| f.parse::<OutputFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(OutputFormat::Text);

    let output_file = matches.get_one::<String>("output-file").cloned();
    let output_config = OutputConfig {
        format,
        colored: !matches.get_flag("no-color") && output_file.is_none(),
        file: output_file,
        verbose: matches.get_count("verbose") > 0,
    };

    let interactive = shows_progress(
        format,
        matches.get_flag("no-progress"),
        matches.get_count("verbose"),
    );
    if format == OutputFormat::Text {
        print_banner(&host, target, range);
    }

    let progress = Arc::new(if interactive {
        ProgressDisplay::new(range.len())
    } else {
        ProgressDisplay::hidden()
    });
    let engine = ScanEngine::new(config)?.with_observer(progress.clone());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let result = engine.scan_until_cancelled(target, range, cancel).await;
    progress.finish();

    let report = match result {
        Ok(report) => report,
        Err(ScanError::Cancelled) => {
            eprintln!("\n{}", "Scan interrupted by user!".bright_red().bold());
            return Err(ScanError::Cancelled.into());
        }
        Err(e) => return Err(e.into()),
    };

    OutputManager::new(output_config).write_results(&report)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    if let Err(err) = run(matches).await {
        let scan_error = err.downcast_ref::<ScanError>();
        if !matches!(scan_error, Some(ScanError::Cancelled)) {
            eprintln!("{} {:#}", "[!]".bright_red(), err);
        }
        process::exit(scan_error.map(ScanError::exit_code).unwrap_or(1));
    }
}
