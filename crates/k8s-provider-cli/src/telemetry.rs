//! Initialises tracing subscribers for console output and JSON file output.
//!
//! Console logs go to stderr, stdout is reserved for command output.

use std::path::PathBuf;

use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, layer::SubscriberExt};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Environment variable holding the console log filter, e.g. `debug` or `k8s_provider=trace`.
pub const CONSOLE_LOG_LEVEL_ENV: &str = "CONSOLE_LOG_LEVEL";

/// Environment variable holding the file log filter.
pub const FILE_LOG_LEVEL_ENV: &str = "FILE_LOG_LEVEL";

const FILE_LOG_PREFIX: &str = "k8s-provider";
const FILE_LOG_SUFFIX: &str = "tracing-rs.json";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },

    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

/// Logging options, available as command line arguments and environment variables.
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::Args)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[arg(long, env)]
    pub console_log_disabled: bool,

    /// Enable logging to files located in the specified DIRECTORY.
    #[arg(long, env, value_name = "DIRECTORY", group = "file_log")]
    pub file_log_directory: Option<PathBuf>,

    /// Time PERIOD after which log files are rolled over.
    #[arg(long, env, value_name = "PERIOD", requires = "file_log")]
    pub file_log_rotation_period: Option<RotationPeriod>,
}

/// Supported periods when the log file is rolled over.
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}

/// Installs the global subscriber described by `options`.
///
/// Nothing is installed when every output is disabled.
pub fn init(options: &TelemetryOptions) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

    if !options.console_log_disabled {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter_builder(CONSOLE_LOG_LEVEL_ENV, LevelFilter::INFO))
                .boxed(),
        );
    }

    if let Some(file_log_dir) = &options.file_log_directory {
        let rotation_period = options
            .file_log_rotation_period
            .clone()
            .unwrap_or_default();

        let file_appender = RollingFileAppender::builder()
            .rotation(rotation_period.into())
            .filename_prefix(FILE_LOG_PREFIX)
            .filename_suffix(FILE_LOG_SUFFIX)
            .build(file_log_dir)
            .context(InitRollingFileAppenderSnafu)?;

        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_appender)
                .with_filter(env_filter_builder(FILE_LOG_LEVEL_ENV, LevelFilter::INFO))
                .boxed(),
        );
    }

    if !layers.is_empty() {
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
            .context(SetGlobalDefaultSubscriberSnafu)?;
    }

    Ok(())
}

fn env_filter_builder(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}
