use snafu::Snafu;
use std::path::PathBuf;

/// The broad category an error falls into.
///
/// Every error in this crate is fatal to a preprocessing run, so callers rarely need more than
/// this to decide how to report it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum ErrorKind {
    /// An input could not be read or an output could not be written
    #[strum(serialize = "I/O error")]
    Io,

    /// The source and target files do not have the same number of lines
    #[strum(serialize = "misaligned corpus")]
    MisalignedCorpus,

    /// A vocabulary or shard file exists but its contents can't be trusted
    #[strum(serialize = "serialization error")]
    Serialization,

    /// The run was configured with values that can't work
    #[strum(serialize = "configuration error")]
    Config,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BitextError {
    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to move completed file into place at '{}'", path.display()))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display(
        "Corpus is misaligned: '{}' has {source_lines} lines but '{}' has {target_lines} lines",
        source_path.display(),
        target_path.display()
    ))]
    MisalignedCorpus {
        source_path: PathBuf,
        target_path: PathBuf,
        source_lines: usize,
        target_lines: usize,
    },

    #[snafu(display("Malformed JSON in '{}'", path.display()))]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Vocabulary file '{}' is corrupt: {reason}", path.display()))]
    InvalidVocabulary { path: PathBuf, reason: String },

    #[snafu(display("Shard file '{}' is corrupt: {reason}", path.display()))]
    InvalidShard { path: PathBuf, reason: String },

    #[snafu(display("Invalid configuration: {reason}"))]
    InvalidConfig { reason: String },
}

impl BitextError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BitextError::FileIo { .. } | BitextError::Persist { .. } => ErrorKind::Io,
            BitextError::MisalignedCorpus { .. } => ErrorKind::MisalignedCorpus,
            BitextError::Json { .. }
            | BitextError::InvalidVocabulary { .. }
            | BitextError::InvalidShard { .. } => ErrorKind::Serialization,
            BitextError::InvalidConfig { .. } => ErrorKind::Config,
        }
    }
}
