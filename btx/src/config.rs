//! Defaults loaded from the file named by `--config`
use anyhow::{Context, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Optional defaults for `prepare` and `index`.  Anything given on the command line or through the
/// environment takes precedence.
///
/// ```json
/// { "where": "/data/wmt14", "shard_size": 5000, "vectorize_gpu": "0" }
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Directory holding the corpus files
    #[serde(rename = "where")]
    pub corpus_dir: Option<PathBuf>,

    pub shard_size: Option<NonZeroUsize>,

    /// When set, `prepare` writes packed batches for this device unless told otherwise
    pub vectorize_gpu: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Load the config file if one was given, otherwise use an empty config
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        path.map(Self::load)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}
