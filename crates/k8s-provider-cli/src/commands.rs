//! The subcommands of the command line host.
//!
//! Each command drives the provider the way an external host would: configuration in, state and
//! diagnostics out. Rendered documents go to `out`, diagnostics to `err`.

use std::{io::Write, path::PathBuf, sync::Arc};

use clap::{Args, Subcommand};
use k8s_provider::{
    config::{self, Config},
    diag::Diagnostics,
    provider::Provider,
    resource::{CreateRequest, DeleteRequest, ReadRequest, Resource, UpdateRequest},
    state::{self, StateFile},
    yaml,
};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unknown resource type {type_name:?}, see the `resources` command"))]
    UnknownResourceType { type_name: String },

    #[snafu(display("failed to load configuration"))]
    LoadConfig { source: config::Error },

    #[snafu(display("failed to load state"))]
    LoadState { source: state::Error },

    #[snafu(display("failed to save state"))]
    SaveState { source: state::Error },

    #[snafu(display("failed to look up resource"))]
    LookupAddress { source: state::MissingAddress },

    #[snafu(display(
        "resource {address:?} has type {existing}, it cannot be applied as {requested}"
    ))]
    TypeChanged {
        address: String,
        existing: String,
        requested: String,
    },

    #[snafu(display("resource {address:?} has no rendered manifest in state"))]
    MissingManifest { address: String },

    #[snafu(display("failed to render CustomResourceDefinition"))]
    RenderCrd { source: yaml::Error },

    #[snafu(display("failed to serialize schema"))]
    SerializeSchema { source: serde_json::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: std::io::Error },

    #[snafu(display("{count} error diagnostic(s) reported"))]
    Diagnostics { count: usize },
}

#[derive(Debug, Args)]
pub struct ResourceArgs {
    /// The resource type name, see the `resources` command.
    #[arg(long = "type", value_name = "TYPE")]
    pub type_name: String,

    /// YAML or JSON file with the resource configuration.
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    /// The local state file. It is created on first use.
    #[arg(
        long = "state",
        env = "K8S_PROVIDER_STATE",
        value_name = "FILE",
        default_value = "k8s-provider.state.json"
    )]
    pub path: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all resource types.
    Resources,

    /// Print the CustomResourceDefinitions of all resource types.
    Crd,

    /// Print the attribute schema of a resource type as JSON.
    Schema {
        #[arg(long = "type", value_name = "TYPE")]
        type_name: String,
    },

    /// Validate a configuration and print the diagnostics.
    Validate {
        #[command(flatten)]
        resource: ResourceArgs,
    },

    /// Render a configuration without recording it in state.
    Render {
        #[command(flatten)]
        resource: ResourceArgs,
    },

    /// Create or update the resource at ADDRESS and record it in state.
    Apply {
        #[command(flatten)]
        resource: ResourceArgs,

        #[arg(long, value_name = "ADDRESS")]
        address: String,

        #[command(flatten)]
        state: StateArgs,
    },

    /// Print the manifest recorded for the resource at ADDRESS.
    Show {
        #[arg(long, value_name = "ADDRESS")]
        address: String,

        #[command(flatten)]
        state: StateArgs,
    },

    /// Remove the resource at ADDRESS from state.
    Destroy {
        #[arg(long, value_name = "ADDRESS")]
        address: String,

        #[command(flatten)]
        state: StateArgs,
    },
}

impl Command {
    pub fn run(self, provider: &Provider, out: &mut impl Write, err: &mut impl Write) -> Result<()> {
        match self {
            Self::Resources => {
                for type_name in provider.type_names() {
                    writeln!(out, "{type_name}").context(WriteOutputSnafu)?;
                }
                Ok(())
            }
            Self::Crd => {
                for (_, resource) in provider.resources() {
                    let crd = resource.crd_yaml().context(RenderCrdSnafu)?;
                    out.write_all(crd.as_bytes()).context(WriteOutputSnafu)?;
                }
                Ok(())
            }
            Self::Schema { type_name } => {
                let resource = lookup(provider, &type_name)?;
                serde_json::to_writer_pretty(&mut *out, resource.schema())
                    .context(SerializeSchemaSnafu)?;
                writeln!(out).context(WriteOutputSnafu)
            }
            Self::Validate { resource: args } => {
                let resource = lookup(provider, &args.type_name)?;
                let config = Config::from_path(&args.config).context(LoadConfigSnafu)?;
                report(resource.validate(&config), err)
            }
            Self::Render { resource: args } => {
                let resource = lookup(provider, &args.type_name)?;
                let config = Config::from_path(&args.config).context(LoadConfigSnafu)?;

                let response = resource.create(CreateRequest { config: &config });
                print_manifest(response.state.as_ref(), "render", out)?;
                report(response.diagnostics, err)
            }
            Self::Apply {
                resource: args,
                address,
                state,
            } => apply(provider, &args, &address, &state, out, err),
            Self::Show { address, state } => {
                let state_file = StateFile::load(&state.path).context(LoadStateSnafu)?;
                let entry = state_file.entry(&address).context(LookupAddressSnafu)?;
                let resource = lookup(provider, &entry.type_name)?;

                let response = resource.read(ReadRequest {
                    state: &entry.state,
                });
                print_manifest(response.state.as_ref(), &address, out)?;
                report(response.diagnostics, err)
            }
            Self::Destroy { address, state } => {
                let mut state_file = StateFile::load(&state.path).context(LoadStateSnafu)?;
                let entry = state_file.entry(&address).context(LookupAddressSnafu)?;
                let resource = lookup(provider, &entry.type_name)?;

                let response = resource.delete(DeleteRequest {
                    prior_state: &entry.state,
                });
                if response.state.is_none() {
                    state_file.remove(&address);
                    state_file.save(&state.path).context(SaveStateSnafu)?;
                    tracing::info!(%address, "destroyed resource");
                }
                report(response.diagnostics, err)
            }
        }
    }
}

fn apply(
    provider: &Provider,
    args: &ResourceArgs,
    address: &str,
    state: &StateArgs,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let resource = lookup(provider, &args.type_name)?;
    let config = Config::from_path(&args.config).context(LoadConfigSnafu)?;
    let mut state_file = StateFile::load(&state.path).context(LoadStateSnafu)?;

    let response = match state_file.get(address) {
        Some(entry) => {
            ensure!(
                entry.type_name == args.type_name,
                TypeChangedSnafu {
                    address,
                    existing: &entry.type_name,
                    requested: &args.type_name,
                }
            );
            resource.update(UpdateRequest {
                config: &config,
                prior_state: &entry.state,
            })
        }
        None => resource.create(CreateRequest { config: &config }),
    };

    if let Some(new_state) = &response.state {
        state_file.insert(address, &args.type_name, new_state.clone());
        state_file.save(&state.path).context(SaveStateSnafu)?;
        tracing::info!(address, id = ?new_state.id(), "applied resource");
    }

    print_manifest(response.state.as_ref(), address, out)?;
    report(response.diagnostics, err)
}

fn lookup(provider: &Provider, type_name: &str) -> Result<Arc<dyn Resource>> {
    provider
        .resource(type_name)
        .context(UnknownResourceTypeSnafu { type_name })
}

fn print_manifest(
    state: Option<&state::State>,
    address: &str,
    out: &mut impl Write,
) -> Result<()> {
    let Some(state) = state else {
        return Ok(());
    };
    let yaml = state
        .yaml()
        .context(MissingManifestSnafu { address })?;
    out.write_all(yaml.as_bytes()).context(WriteOutputSnafu)
}

/// Prints every diagnostic and fails if any of them is an error.
fn report(diagnostics: Diagnostics, err: &mut impl Write) -> Result<()> {
    let count = diagnostics.errors().count();
    for diagnostic in diagnostics {
        writeln!(err, "{diagnostic}").context(WriteOutputSnafu)?;
    }

    ensure!(count == 0, DiagnosticsSnafu { count });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use rstest::{fixture, rstest};

    use super::*;

    const TYPE_NAME: &str = "k8s_installation_mattermost_com_mattermost_v1beta1";

    const MM1: &str = r#"{
        "metadata": { "name": "mm1", "namespace": "team-a" },
        "spec": { "replicas": 2, "ingress": { "enabled": true, "host": "chat.example.com" } }
    }"#;

    #[fixture]
    fn provider() -> Provider {
        Provider::kubernetes().unwrap()
    }

    struct Output {
        out: String,
        err: String,
        result: Result<()>,
    }

    fn run(provider: &Provider, command: Command) -> Output {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = command.run(provider, &mut out, &mut err);

        Output {
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
            result,
        }
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(&path, contents).unwrap();
        path
    }

    fn apply_command(config: PathBuf, state: PathBuf) -> Command {
        Command::Apply {
            resource: ResourceArgs {
                type_name: TYPE_NAME.to_owned(),
                config,
            },
            address: "mm".to_owned(),
            state: StateArgs { path: state },
        }
    }

    #[rstest]
    fn resources(provider: Provider) {
        let output = run(&provider, Command::Resources);
        assert!(output.result.is_ok());
        assert_eq!(output.out, format!("{TYPE_NAME}\n"));
    }

    #[rstest]
    fn schema_lists_computed_attributes(provider: Provider) {
        let output = run(
            &provider,
            Command::Schema {
                type_name: TYPE_NAME.to_owned(),
            },
        );
        assert!(output.result.is_ok());

        let schema: serde_json::Value = serde_json::from_str(&output.out).unwrap();
        let names = schema["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|attribute| attribute["computed"] == true)
            .map(|attribute| attribute["name"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["id", "api_version", "kind", "yaml"]);
    }

    #[rstest]
    fn unknown_type(provider: Provider) {
        let output = run(
            &provider,
            Command::Schema {
                type_name: "k8s_nope".to_owned(),
            },
        );
        assert!(matches!(
            output.result,
            Err(Error::UnknownResourceType { .. })
        ));
    }

    #[rstest]
    fn validate_reports_invalid_name(provider: Provider) {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), r#"{ "metadata": { "name": "My_Name" } }"#);

        let output = run(
            &provider,
            Command::Validate {
                resource: ResourceArgs {
                    type_name: TYPE_NAME.to_owned(),
                    config,
                },
            },
        );

        assert!(matches!(output.result, Err(Error::Diagnostics { count: 1 })));
        assert!(output.err.contains("(at metadata.name)"));
    }

    #[rstest]
    fn apply_show_destroy(provider: Provider) {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), MM1);
        let state = dir.path().join("state.json");

        let created = run(&provider, apply_command(config.clone(), state.clone()));
        assert!(created.result.is_ok(), "{}", created.err);
        assert!(created.out.contains("host: chat.example.com"));

        let first_id = StateFile::load(&state).unwrap().entry("mm").unwrap().state.id();

        let updated = run(&provider, apply_command(config, state.clone()));
        assert!(updated.result.is_ok(), "{}", updated.err);
        assert_eq!(updated.out, created.out);

        let second_id = StateFile::load(&state).unwrap().entry("mm").unwrap().state.id();
        assert!(second_id > first_id);

        let shown = run(
            &provider,
            Command::Show {
                address: "mm".to_owned(),
                state: StateArgs {
                    path: state.clone(),
                },
            },
        );
        assert!(shown.result.is_ok());
        assert_eq!(shown.out, created.out);

        let destroyed = run(
            &provider,
            Command::Destroy {
                address: "mm".to_owned(),
                state: StateArgs {
                    path: state.clone(),
                },
            },
        );
        assert!(destroyed.result.is_ok());
        assert!(StateFile::load(&state).unwrap().get("mm").is_none());
    }

    #[rstest]
    fn failed_apply_leaves_state_untouched(provider: Provider) {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let config = write_config(dir.path(), r#"{ "metadata": { "name": "My_Name" } }"#);

        let output = run(&provider, apply_command(config, state.clone()));

        assert!(matches!(output.result, Err(Error::Diagnostics { .. })));
        assert!(output.out.is_empty());
        assert!(!state.exists());
    }
}
