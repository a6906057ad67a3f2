//! Drives a complete preparation run: read the corpus, build or load vocabularies, and write
//! shards.
//!
//! There are two modes:
//!
//! - **raw**: one pass.  Each pair is indexed into the vocabularies as it is read, and shards hold
//!   the normalized text.  The vocabularies are saved once the corpus is exhausted.
//! - **vectorized**: two passes.  Both vocabularies are built from the complete corpus first, so
//!   every training token has a real id before anything is encoded; then the corpus is read again
//!   and each shard is packed into padded token ids.
//!
//! Either mode can instead reuse vocabularies saved by an earlier run (the usual way to encode a
//! validation or test split with the training vocabulary), in which case nothing is indexed and no
//! vocabulary is written.
use crate::batch::BatchPacker;
use crate::corpus::{CorpusReader, LineReader, SentencePair};
use crate::error::*;
use crate::normalize::normalize;
use crate::shard::{ShardNaming, ShardPayload, ShardWriter};
use crate::vocab::Vocabulary;
use crate::Result;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::*;

/// Number of sentence pairs per shard unless configured otherwise
pub const DEFAULT_SHARD_SIZE: usize = 10_000;

/// What each shard holds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PackingMode {
    /// Normalized text pairs
    Raw,

    /// Packed batches of token ids.
    ///
    /// `device` names the accelerator the batches are meant for.  It is carried through for the
    /// benefit of whatever loads the shards; nothing here interprets it.
    Vectorized { device: String },
}

impl PackingMode {
    /// Turn one shard's worth of pairs into the payload this mode writes.
    ///
    /// `first_index` is the corpus line number of the first pair.
    pub fn payload(
        &self,
        first_index: usize,
        pairs: Vec<SentencePair>,
        source: &Vocabulary,
        target: &Vocabulary,
    ) -> ShardPayload {
        match self {
            PackingMode::Raw => ShardPayload::Pairs(pairs),
            PackingMode::Vectorized { .. } => {
                ShardPayload::Packed(BatchPacker::new(source, target).pack_from(first_index, &pairs))
            }
        }
    }
}

/// Where the vocabularies for a run come from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum VocabSource {
    /// Build new vocabularies from this corpus and save them
    #[default]
    Build,

    /// Load the vocabularies saved when the corpus split `name` was prepared, and only encode
    Reuse { name: String },
}

/// Everything needed to prepare one corpus split.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrepareConfig {
    /// Directory holding the corpus files.  Vocabularies and shards are written here too.
    pub corpus_dir: PathBuf,

    /// Name of the split, e.g. `train` for `train.en` and `train.de`
    pub name: String,

    pub source_lang: String,
    pub target_lang: String,

    /// Maximum number of pairs per shard
    pub shard_size: NonZeroUsize,

    pub mode: PackingMode,
    pub vocab_source: VocabSource,
}

impl PrepareConfig {
    /// A raw-mode configuration with the default shard size that builds its own vocabularies
    pub fn new(
        corpus_dir: impl Into<PathBuf>,
        name: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            name: name.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            shard_size: NonZeroUsize::new(DEFAULT_SHARD_SIZE).expect("BUG: default is non-zero"),
            mode: PackingMode::Raw,
            vocab_source: VocabSource::Build,
        }
    }

    /// Reject configurations that would read or write the wrong files.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| InvalidConfigSnafu { reason }.build();

        let mut names = vec![
            ("corpus name", self.name.as_str()),
            ("source language", self.source_lang.as_str()),
            ("target language", self.target_lang.as_str()),
        ];
        if let VocabSource::Reuse { name } = &self.vocab_source {
            names.push(("vocabulary corpus name", name.as_str()));
        }

        for (what, value) in names {
            if value.is_empty() {
                return Err(invalid(format!("{what} must not be empty")));
            }
            if value.contains(|c: char| c == '/' || c == '\\') {
                return Err(invalid(format!(
                    "{what} '{value}' must not contain a path separator"
                )));
            }
        }

        if self.source_lang == self.target_lang {
            return Err(invalid(format!(
                "source and target language are both '{}'",
                self.source_lang
            )));
        }

        if self.mode == PackingMode::Raw && self.vocab_source != VocabSource::Build {
            return Err(invalid(
                "reusing existing vocabularies requires vectorized mode".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the corpus file for `lang`
    pub fn corpus_path(&self, lang: &str) -> PathBuf {
        self.corpus_dir.join(format!("{}.{lang}", self.name))
    }

    /// Path of the vocabulary file for `lang` that this run reads or writes
    pub fn vocabulary_path(&self, lang: &str) -> PathBuf {
        let name = match &self.vocab_source {
            VocabSource::Build => &self.name,
            VocabSource::Reuse { name } => name,
        };
        vocabulary_path(&self.corpus_dir, lang, name)
    }

    pub fn shard_naming(&self) -> ShardNaming {
        ShardNaming::new(&self.corpus_dir, &self.source_lang, &self.target_lang)
    }
}

/// Conventional path of the vocabulary for `lang` built from corpus split `name`
pub fn vocabulary_path(dir: &Path, lang: &str, name: &str) -> PathBuf {
    dir.join(format!("{lang}-lang-{name}.dict"))
}

/// What a preparation run produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrepareSummary {
    /// Number of sentence pairs read from the corpus
    pub pairs: usize,

    /// Every shard file written, in shard order
    pub shards: Vec<PathBuf>,

    /// Vocabulary files written.  Empty when existing vocabularies were reused.
    pub vocabularies: Vec<PathBuf>,

    /// Final size of each vocabulary, reserved ids included
    pub source_vocab_len: usize,
    pub target_vocab_len: usize,
}

/// Build a vocabulary from every line of a single corpus file.
#[instrument(skip_all, fields(path = %path.as_ref().display(), lang = %lang))]
pub fn index_corpus(path: impl AsRef<Path>, lang: &str) -> Result<Vocabulary> {
    let mut vocab = Vocabulary::new(lang);
    let mut lines = LineReader::open(path.as_ref())?;
    let mut count = 0usize;

    while let Some(line) = lines.next_line()? {
        vocab.index(&normalize(&line));
        count += 1;
    }

    info!(
        lines = count,
        tokens = vocab.len(),
        "built vocabulary"
    );
    Ok(vocab)
}

/// Run a complete preparation of one corpus split.
///
/// Fails on the first error; there is nothing to recover, and the artifacts written so far should
/// be regenerated by running again from the start.
#[instrument(skip_all, fields(dir = %config.corpus_dir.display(), name = %config.name,
    src = %config.source_lang, targ = %config.target_lang))]
pub fn prepare(config: &PrepareConfig) -> Result<PrepareSummary> {
    config.validate()?;

    let source_path = config.corpus_path(&config.source_lang);
    let target_path = config.corpus_path(&config.target_lang);

    let (mut source_vocab, mut target_vocab) = match (&config.vocab_source, &config.mode) {
        (VocabSource::Reuse { .. }, _) => {
            info!("Loading existing dictionaries...");
            (
                Vocabulary::load(config.vocabulary_path(&config.source_lang))?,
                Vocabulary::load(config.vocabulary_path(&config.target_lang))?,
            )
        }
        (VocabSource::Build, PackingMode::Vectorized { .. }) => {
            info!("Creating source corpus dictionary...");
            let source = index_corpus(&source_path, &config.source_lang)?;
            info!("Creating target corpus dictionary...");
            let target = index_corpus(&target_path, &config.target_lang)?;
            (source, target)
        }
        (VocabSource::Build, PackingMode::Raw) => (
            Vocabulary::new(&config.source_lang),
            Vocabulary::new(&config.target_lang),
        ),
    };

    // Only raw mode grows the vocabularies while sharding; vectorized mode has already built them
    let index_while_reading =
        config.vocab_source == VocabSource::Build && config.mode == PackingMode::Raw;

    if let PackingMode::Vectorized { device } = &config.mode {
        info!(%device, "Loading shards...");
    }

    let shard_size = config.shard_size.get();
    let mut corpus = CorpusReader::open(&source_path, &target_path)?;
    let mut writer = ShardWriter::new(config.shard_naming());
    let mut buffer = Vec::with_capacity(shard_size.min(DEFAULT_SHARD_SIZE));

    loop {
        let pair = corpus.next_pair()?;
        let exhausted = pair.is_none();

        if let Some(pair) = pair {
            if buffer.is_empty() {
                info!(shard = writer.next_index(), "Processing shard");
            }
            if index_while_reading {
                source_vocab.index(&pair.source);
                target_vocab.index(&pair.target);
            }
            buffer.push(pair);
        }

        if buffer.len() == shard_size || (exhausted && !buffer.is_empty()) {
            let first_index = writer.next_index() * shard_size;
            let pairs = std::mem::take(&mut buffer);
            let payload = config
                .mode
                .payload(first_index, pairs, &source_vocab, &target_vocab);
            writer.write(&payload)?;
        }

        if exhausted {
            break;
        }
    }

    let vocabularies = if config.vocab_source == VocabSource::Build {
        let source = config.vocabulary_path(&config.source_lang);
        let target = config.vocabulary_path(&config.target_lang);
        source_vocab.save(&source)?;
        target_vocab.save(&target)?;
        vec![source, target]
    } else {
        Vec::new()
    };

    let summary = PrepareSummary {
        pairs: corpus.pairs_read(),
        shards: writer.into_written(),
        vocabularies,
        source_vocab_len: source_vocab.len(),
        target_vocab_len: target_vocab.len(),
    };

    info!(
        pairs = summary.pairs,
        shards = summary.shards.len(),
        source_vocab = summary.source_vocab_len,
        target_vocab = summary.target_vocab_len,
        "preparation complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use assert_matches::assert_matches;

    fn config() -> PrepareConfig {
        PrepareConfig::new("/data", "train", "en", "de")
    }

    #[test]
    fn paths_follow_naming_conventions() {
        let config = config();
        assert_eq!(config.corpus_path("en"), PathBuf::from("/data/train.en"));
        assert_eq!(
            config.vocabulary_path("de"),
            PathBuf::from("/data/de-lang-train.dict")
        );

        let reuse = PrepareConfig {
            name: "valid".into(),
            vocab_source: VocabSource::Reuse {
                name: "train".into(),
            },
            ..config
        };
        assert_eq!(reuse.corpus_path("en"), PathBuf::from("/data/valid.en"));
        assert_eq!(
            reuse.vocabulary_path("en"),
            PathBuf::from("/data/en-lang-train.dict")
        );
    }

    #[test]
    fn default_config_is_valid() {
        let config = config();
        assert_eq!(config.shard_size.get(), DEFAULT_SHARD_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_configs_are_rejected() {
        let cases = [
            PrepareConfig::new("/data", "", "en", "de"),
            PrepareConfig::new("/data", "train", "en/../x", "de"),
            PrepareConfig::new("/data", "train", "en", "en"),
            PrepareConfig {
                vocab_source: VocabSource::Reuse {
                    name: "train".into(),
                },
                ..config()
            },
        ];

        for case in cases {
            let err = case.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{case:?}");
            assert_matches!(err, BitextError::InvalidConfig { .. });
        }
    }

    #[test]
    fn raw_payload_passes_pairs_through() {
        let vocab = Vocabulary::new("en");
        let pairs = vec![SentencePair::new("a b", "c")];

        let payload = PackingMode::Raw.payload(10, pairs.clone(), &vocab, &vocab);
        assert_eq!(payload, ShardPayload::Pairs(pairs));
    }

    #[test]
    fn vectorized_payload_is_packed_from_offset() {
        let mut vocab = Vocabulary::new("en");
        vocab.index("a b c");
        let pairs = vec![SentencePair::new("a b", "c"), SentencePair::new("c", "")];

        let mode = PackingMode::Vectorized {
            device: "0".into(),
        };
        let payload = mode.payload(10, pairs, &vocab, &vocab);
        assert_matches!(payload, ShardPayload::Packed(batch) if batch.indexes == vec![10, 11]);
    }

    #[test]
    fn packed_indexes_trace_back_to_corpus_lines() {
        crate::test_helpers::init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let lines: String = (0..7).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("train.en"), &lines).unwrap();
        std::fs::write(dir.path().join("train.de"), &lines).unwrap();

        let config = PrepareConfig {
            shard_size: NonZeroUsize::new(3).unwrap(),
            mode: PackingMode::Vectorized {
                device: "0".into(),
            },
            ..PrepareConfig::new(dir.path(), "train", "en", "de")
        };
        let summary = prepare(&config).unwrap();
        let source = Vocabulary::load(config.vocabulary_path("en")).unwrap();

        let mut line = 0;
        for path in &summary.shards {
            let ShardPayload::Packed(batch) = crate::read_shard(path).unwrap() else {
                panic!("expected a packed shard");
            };
            for (row, &index) in batch.source.iter().zip(&batch.indexes) {
                assert_eq!(index, line);
                assert_eq!(
                    source.decode(&row[..2]),
                    vec!["line".to_string(), line.to_string()]
                );
                line += 1;
            }
        }
        assert_eq!(line, 7);
        assert_eq!(summary.shards.len(), 3);
    }
}
