//! Resource state and the local state file.

use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::config::Config;

type Result<T, E = Error> = std::result::Result<T, E>;

/// The only state file layout written and understood.
pub const STATE_FILE_VERSION: u32 = 1;

pub const ID: &str = "id";
pub const API_VERSION: &str = "api_version";
pub const KIND: &str = "kind";
pub const YAML: &str = "yaml";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read state file {path:?}"))]
    ReadStateFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse state file {path:?}"))]
    ParseStateFile {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("state file {path:?} has version {version}, expected {STATE_FILE_VERSION}"))]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[snafu(display("failed to create temporary state file next to {path:?}"))]
    CreateTempFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write state file {path:?}"))]
    WriteStateFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to serialize state file {path:?}"))]
    SerializeStateFile {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to replace state file {path:?}"))]
    PersistStateFile {
        source: tempfile::PersistError,
        path: PathBuf,
    },

    #[snafu(display("state must be an object"))]
    StateNotAnObject,
}

/// The attributes of one resource as last written: its configuration plus the computed
/// attributes.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct State(Map<String, Value>);

impl State {
    /// Starts a new state from the configuration it was written from.
    pub fn from_config(config: &Config) -> Self {
        Self(config.as_map().clone())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn id(&self) -> Option<i64> {
        self.get(ID).and_then(Value::as_i64)
    }

    pub fn api_version(&self) -> Option<&str> {
        self.get(API_VERSION).and_then(Value::as_str)
    }

    pub fn kind(&self) -> Option<&str> {
        self.get(KIND).and_then(Value::as_str)
    }

    /// The rendered manifest.
    pub fn yaml(&self) -> Option<&str> {
        self.get(YAML).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for State {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self(object)),
            _ => StateNotAnObjectSnafu.fail(),
        }
    }
}

/// One entry of the state file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub state: State,
}

/// A local state file, keyed by resource address.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StateFile {
    pub version: u32,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Loads the state file at `path`. A missing file is an empty state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "state file does not exist yet, starting empty");
                return Ok(Self::default());
            }
            Err(err) => return Err(err).context(ReadStateFileSnafu { path }),
        };

        let state_file: Self =
            serde_json::from_str(&contents).context(ParseStateFileSnafu { path })?;
        ensure!(
            state_file.version == STATE_FILE_VERSION,
            UnsupportedVersionSnafu {
                path,
                version: state_file.version
            }
        );

        Ok(state_file)
    }

    /// Writes the state file to `path`.
    ///
    /// The content goes to a temporary file in the same directory first, which then replaces
    /// `path`. Readers never observe a partially written file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let file = tempfile::NamedTempFile::new_in(directory)
            .context(CreateTempFileSnafu { path })?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .context(SerializeStateFileSnafu { path })?;
        writer
            .write_all(b"\n")
            .context(WriteStateFileSnafu { path })?;
        let file = writer
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)
            .context(WriteStateFileSnafu { path })?;

        file.persist(path).context(PersistStateFileSnafu { path })?;
        tracing::debug!(?path, resources = self.resources.len(), "saved state file");

        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&ResourceEntry> {
        self.resources.get(address)
    }

    pub fn insert(&mut self, address: impl Into<String>, type_name: impl Into<String>, state: State) {
        self.resources.insert(
            address.into(),
            ResourceEntry {
                type_name: type_name.into(),
                state,
            },
        );
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceEntry> {
        self.resources.remove(address)
    }

    /// Looks up the entry at `address`, failing with a missing-address error message.
    pub fn entry(&self, address: &str) -> Result<&ResourceEntry, MissingAddress> {
        self.get(address).context(MissingAddressSnafu { address })
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("no resource with address {address:?} in state"))]
pub struct MissingAddress {
    address: String,
}
