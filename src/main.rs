use anyhow::Context;
use clap::Parser;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plan_insight::config::{CommandLineArgs, Config, InputFormat, LoggingConfig};
use plan_insight::services::plan_analyzer::{
    AnalysisContext, analyze_binary_plan, analyze_plan_json, read_plan_input,
};

fn main() -> anyhow::Result<()> {
    let args = CommandLineArgs::parse();

    // Load configuration first
    let config = Config::load(&args)?;

    // The guard flushes the file writer on exit
    let _guard = init_logging(&config.logging);
    tracing::debug!("Configuration loaded successfully");

    let input = read_plan_input(args.input.as_deref()).with_context(|| match &args.input {
        Some(path) => format!("Failed to read plan from {}", path.display()),
        None => "Failed to read plan from stdin".to_string(),
    })?;
    let context = AnalysisContext::with_thresholds(config.analyzer.clone());

    let forest = match config.input.format {
        InputFormat::Blob => analyze_binary_plan(&input, &context)?,
        InputFormat::Json => analyze_plan_json(&input, &context)?,
    };

    let Some(forest) = forest else {
        tracing::info!("Input is empty, nothing to analyze");
        return Ok(());
    };

    let output = if config.output.pretty {
        serde_json::to_string_pretty(&forest)?
    } else {
        serde_json::to_string(&forest)?
    };
    println!("{}", output);

    Ok(())
}

/// Initialize logging: stderr always, plus a daily rolling file when configured
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let log_filter = tracing_subscriber::EnvFilter::new(&logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    let Some(log_file) = &logging.file else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return None;
    };

    // Ensure log directory exists
    let log_path = Path::new(log_file);
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let _ = std::fs::create_dir_all(log_dir);

    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("plan-insight.log");
    // Rolling appender adds the date suffix
    let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

    let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    registry
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Some(guard)
}
