//! Wire encoding of a finished checkpoint

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// Artifact location of a single container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultContainer {
    #[serde(rename = "CheckpointPath")]
    pub checkpoint_path: String,
}

/// Response body of a checkpoint request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckpointResult {
    #[serde(rename = "Containers")]
    pub containers: BTreeMap<String, ResultContainer>,
}

impl CheckpointResult {
    /// Map every requested container to `<checkpoint_dir>/<name>`.
    ///
    /// Artifact presence is not checked. Repeated names collapse into a
    /// single entry.
    pub fn from_containers<S: AsRef<str>>(checkpoint_dir: &Path, containers: &[S]) -> Self {
        let containers = containers
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let checkpoint_path = checkpoint_dir.join(name).to_string_lossy().into_owned();
                (name.to_string(), ResultContainer { checkpoint_path })
            })
            .collect();
        Self { containers }
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn checkpoint_path(&self, container: &str) -> Option<&str> {
        self.containers
            .get(container)
            .map(|c| c.checkpoint_path.as_str())
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
