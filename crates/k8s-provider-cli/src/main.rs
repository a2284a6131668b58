use clap::Parser;
use k8s_provider::provider::{self, Provider};
use snafu::{ResultExt, Snafu};

use crate::{commands::Command, telemetry::TelemetryOptions};

mod commands;
mod telemetry;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitTracing { source: telemetry::Error },

    #[snafu(display("failed to initialize the provider"))]
    InitProvider { source: provider::Error },

    #[snafu(display("command failed"))]
    Command { source: commands::Error },
}

/// Renders Kubernetes custom resources from declarative configuration and tracks them in a local
/// state file.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Prefix of all resource type names.
    #[arg(long, env = "K8S_PROVIDER_PREFIX", default_value = provider::DEFAULT_PREFIX)]
    prefix: String,

    #[command(flatten)]
    telemetry: TelemetryOptions,

    #[command(subcommand)]
    command: Command,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    telemetry::init(&cli.telemetry).context(InitTracingSnafu)?;

    let provider = Provider::kubernetes_with_prefix(cli.prefix).context(InitProviderSnafu)?;
    tracing::debug!(prefix = provider.prefix(), "initialized provider");

    cli.command
        .run(&provider, &mut std::io::stdout(), &mut std::io::stderr())
        .context(CommandSnafu)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::CommandFactory;

    use super::*;
    use crate::telemetry::RotationPeriod;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply() {
        let cli = Cli::try_parse_from([
            "k8s-provider",
            "--file-log-directory",
            "/tmp/logs",
            "--file-log-rotation-period",
            "daily",
            "apply",
            "--type",
            "k8s_installation_mattermost_com_mattermost_v1beta1",
            "--address",
            "mm",
            "--config",
            "mm.yaml",
            "--state",
            "state.json",
        ])
        .unwrap();

        assert_eq!(cli.prefix, "k8s");
        assert_eq!(
            cli.telemetry.file_log_directory,
            Some(PathBuf::from("/tmp/logs"))
        );
        assert_eq!(
            cli.telemetry.file_log_rotation_period,
            Some(RotationPeriod::Daily)
        );
        assert!(matches!(cli.command, Command::Apply { .. }));
    }

    #[test]
    fn rotation_requires_directory() {
        assert!(
            Cli::try_parse_from([
                "k8s-provider",
                "--file-log-rotation-period",
                "hourly",
                "resources",
            ])
            .is_err()
        );
    }
}
