//! Shard files: bounded, numbered partitions of the prepared corpus.
use crate::batch::PackedBatch;
use crate::corpus::SentencePair;
use crate::error::*;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::*;

/// What one shard holds.
///
/// Both preparation modes produce shards through the same writer; they differ only in which
/// variant they hand it.  The variant is recorded in the file so a reader never has to guess.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ShardPayload {
    /// Normalized text, not yet encoded
    Pairs(Vec<SentencePair>),

    /// Encoded, padded token ids
    Packed(PackedBatch),
}

impl ShardPayload {
    /// Number of sentence pairs in the shard
    pub fn len(&self) -> usize {
        match self {
            ShardPayload::Pairs(pairs) => pairs.len(),
            ShardPayload::Packed(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The file extension used for shards holding this kind of payload
    pub fn extension(&self) -> &'static str {
        match self {
            ShardPayload::Pairs(_) => "pairs.json",
            ShardPayload::Packed(_) => "batch.json",
        }
    }
}

/// Where the shards of one source/target language pair live and what they're called.
///
/// Shard `n` of an `en`→`de` corpus is `sentence-pairs-en-de-shard-{n}.{ext}` in `dir`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShardNaming {
    pub dir: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
}

impl ShardNaming {
    pub fn new(
        dir: impl Into<PathBuf>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    pub fn path_for(&self, shard_index: usize, extension: &str) -> PathBuf {
        self.dir.join(format!(
            "sentence-pairs-{}-{}-shard-{shard_index}.{extension}",
            self.source_lang, self.target_lang
        ))
    }
}

/// Write one shard file, returning its path.
///
/// Serialization is deterministic, and the file only appears at its final path once it has been
/// completely written.  A packed batch that fails [`PackedBatch::validate`] is refused with
/// [`BitextError::InvalidShard`] and nothing is written, so every shard this writes can be read
/// back by [`read_shard`].
pub fn write_shard(
    naming: &ShardNaming,
    shard_index: usize,
    payload: &ShardPayload,
) -> Result<PathBuf> {
    let path = naming.path_for(shard_index, payload.extension());
    check_payload(&path, payload)?;
    crate::persist::write_json_atomic(&path, payload)?;
    info!(shard = shard_index, pairs = payload.len(), path = %path.display(), "wrote shard");
    Ok(path)
}

/// Load a shard file written by [`write_shard`].
///
/// Packed batches are re-validated, so a shard whose arrays were tampered with or damaged is
/// reported as corrupt rather than handed to a trainer.
pub fn read_shard(path: impl AsRef<Path>) -> Result<ShardPayload> {
    let path = path.as_ref();
    let payload: ShardPayload = crate::persist::read_json(path)?;
    check_payload(path, &payload)?;

    Ok(payload)
}

fn check_payload(path: &Path, payload: &ShardPayload) -> Result<()> {
    if let ShardPayload::Packed(batch) = payload {
        batch
            .validate()
            .map_err(|reason| InvalidShardSnafu { path, reason }.build())?;
    }
    Ok(())
}

/// Writes consecutive shards, numbering them from zero.
pub struct ShardWriter {
    naming: ShardNaming,
    next_index: usize,
    written: Vec<PathBuf>,
}

impl ShardWriter {
    pub fn new(naming: ShardNaming) -> Self {
        Self {
            naming,
            next_index: 0,
            written: Vec::new(),
        }
    }

    /// Index the next shard will be written with
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Write `payload` as the next shard.  The counter only advances if the write succeeded.
    pub fn write(&mut self, payload: &ShardPayload) -> Result<PathBuf> {
        let path = write_shard(&self.naming, self.next_index, payload)?;
        self.next_index += 1;
        self.written.push(path.clone());
        Ok(path)
    }

    /// Paths of every shard written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }
}
