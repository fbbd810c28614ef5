use crate::services::plan_analyzer::DiagnosticThresholds;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub analyzer: DiagnosticThresholds,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub format: InputFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print the annotated plan
    pub pretty: bool,
}

/// How the input plan is encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// base64 text wrapping a snappy compressed payload
    #[default]
    Blob,
    /// Already decoded plan JSON
    Json,
}

impl std::str::FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blob" => Ok(Self::Blob),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported input format: {}", other)),
        }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "plan-insight")]
#[command(version, about = "Plan Insight - execution plan duration and diagnostics analyzer")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Plan file to analyze (reads stdin when omitted)
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Input encoding (overrides config file)
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub format: Option<InputFormat>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pub pretty: bool,

    /// Logging level (overrides config file, e.g., "info,plan_insight=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file; rolled daily (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_, `.env` honored)
    /// 3. Configuration file (conf/config.toml or config.toml)
    /// 4. Default values
    pub fn load(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        let _ = dotenvy::dotenv();

        // 1. Load from config file (use CLI --config if provided, otherwise find default)
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            Config::default()
        };

        // 2. Override with environment variables
        config.apply_env_overrides(|key| std::env::var(key).ok());

        // 3. Override with command line arguments (highest priority)
        config.apply_cli_overrides(cli_args);

        // 4. Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,plan_insight=debug")
    /// - APP_LOG_FILE: Log file path
    /// - APP_OUTPUT_PRETTY: Pretty-print output (true/false)
    /// - APP_INPUT_FORMAT: Input encoding (blob/json)
    /// - APP_ESTIMATION_ERROR_RATIO: Row estimation error factor (default: 100)
    /// - APP_INDEX_JOIN_MAX_BUILD_TASKS: Index join build task limit (default: 10000)
    /// - APP_TIFLASH_SUGGEST_ROWS: TiKV full scan rows before suggesting TiFlash
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Some(file) = var("APP_LOG_FILE") {
            self.logging.file = Some(file);
            tracing::info!("Override logging.file from env: {:?}", self.logging.file);
        }

        if let Some(pretty) = var("APP_OUTPUT_PRETTY")
            && let Ok(pretty) = pretty.parse()
        {
            self.output.pretty = pretty;
            tracing::info!("Override output.pretty from env: {}", self.output.pretty);
        }

        if let Some(format) = var("APP_INPUT_FORMAT") {
            match format.parse() {
                Ok(val) => {
                    self.input.format = val;
                    tracing::info!("Override input.format from env: {:?}", self.input.format);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_INPUT_FORMAT '{}': {} (keep {:?})",
                    format,
                    e,
                    self.input.format
                ),
            }
        }

        // Analyzer threshold overrides
        if let Some(ratio) = var("APP_ESTIMATION_ERROR_RATIO") {
            match ratio.parse() {
                Ok(val) => {
                    self.analyzer.estimation_error_ratio = val;
                    tracing::info!(
                        "Override analyzer.estimation_error_ratio from env: {}",
                        self.analyzer.estimation_error_ratio
                    );
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_ESTIMATION_ERROR_RATIO '{}': {} (keep {})",
                    ratio,
                    e,
                    self.analyzer.estimation_error_ratio
                ),
            }
        }

        if let Some(tasks) = var("APP_INDEX_JOIN_MAX_BUILD_TASKS") {
            match tasks.parse() {
                Ok(val) => {
                    self.analyzer.index_join_max_build_tasks = val;
                    tracing::info!(
                        "Override analyzer.index_join_max_build_tasks from env: {}",
                        self.analyzer.index_join_max_build_tasks
                    );
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_INDEX_JOIN_MAX_BUILD_TASKS '{}': {} (keep {})",
                    tasks,
                    e,
                    self.analyzer.index_join_max_build_tasks
                ),
            }
        }

        if let Some(rows) = var("APP_TIFLASH_SUGGEST_ROWS") {
            match rows.parse() {
                Ok(val) => {
                    self.analyzer.tiflash_suggest_rows = val;
                    tracing::info!(
                        "Override analyzer.tiflash_suggest_rows from env: {}",
                        self.analyzer.tiflash_suggest_rows
                    );
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_TIFLASH_SUGGEST_ROWS '{}': {} (keep {})",
                    rows,
                    e,
                    self.analyzer.tiflash_suggest_rows
                ),
            }
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(file) = &args.log_file {
            self.logging.file = Some(file.clone());
            tracing::info!("Override logging.file from CLI: {}", file);
        }

        if let Some(format) = args.format {
            self.input.format = format;
            tracing::info!("Override input.format from CLI: {:?}", self.input.format);
        }

        if args.pretty {
            self.output.pretty = true;
            tracing::info!("Override output.pretty from CLI: true");
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level cannot be empty");
        }

        let analyzer = &self.analyzer;
        if analyzer.estimation_error_ratio.is_nan() || analyzer.estimation_error_ratio <= 1.0 {
            anyhow::bail!("analyzer.estimation_error_ratio must be > 1");
        }
        if !(0.0..=1.0).contains(&analyzer.index_read_selectivity)
            || analyzer.index_read_selectivity == 0.0
        {
            anyhow::bail!("analyzer.index_read_selectivity must be in (0, 1]");
        }
        if analyzer.index_join_max_build_tasks == 0 {
            anyhow::bail!("analyzer.index_join_max_build_tasks must be > 0");
        }
        if analyzer.missing_index_min_scan_rows <= analyzer.missing_index_max_selection_rows {
            anyhow::bail!(
                "analyzer.missing_index_min_scan_rows must be greater than \
                 analyzer.missing_index_max_selection_rows"
            );
        }
        if analyzer.tiflash_suggest_rows == 0 {
            anyhow::bail!("analyzer.tiflash_suggest_rows must be > 0");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn,plan_insight=info".to_string(), file: None }
    }
}
