//! End-to-end preparation runs against corpora written to a temporary directory
use assert_matches::assert_matches;
use bitext::*;
use std::num::NonZeroUsize;
use std::path::Path;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_corpus(dir: &Path, name: &str, source: &[&str], target: &[&str]) {
    let join = |lines: &[&str]| lines.iter().map(|l| format!("{l}\n")).collect::<String>();
    std::fs::write(dir.join(format!("{name}.en")), join(source)).unwrap();
    std::fs::write(dir.join(format!("{name}.de")), join(target)).unwrap();
}

fn numbered_corpus(dir: &Path, name: &str, lines: usize) {
    let source: Vec<_> = (0..lines).map(|i| format!("Sentence number {i}.")).collect();
    let target: Vec<_> = (0..lines).map(|i| format!("Satz Nummer {i}.")).collect();
    let source: Vec<_> = source.iter().map(String::as_str).collect();
    let target: Vec<_> = target.iter().map(String::as_str).collect();
    write_corpus(dir, name, &source, &target);
}

fn config(dir: &Path, shard_size: usize) -> PrepareConfig {
    PrepareConfig {
        shard_size: NonZeroUsize::new(shard_size).unwrap(),
        ..PrepareConfig::new(dir, "train", "en", "de")
    }
}

fn vectorized(dir: &Path, shard_size: usize) -> PrepareConfig {
    PrepareConfig {
        mode: PackingMode::Vectorized {
            device: "0".to_string(),
        },
        ..config(dir, shard_size)
    }
}

#[test]
fn raw_mode_shards_25_lines_into_10_10_5() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    numbered_corpus(dir.path(), "train", 25);

    let summary = prepare(&config(dir.path(), 10)).unwrap();

    assert_eq!(summary.pairs, 25);
    assert_eq!(summary.shards.len(), 3);

    let sizes: Vec<_> = summary
        .shards
        .iter()
        .map(|path| read_shard(path).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);

    for (index, path) in summary.shards.iter().enumerate() {
        assert_eq!(
            path,
            &dir.path()
                .join(format!("sentence-pairs-en-de-shard-{index}.pairs.json"))
        );
    }

    let ShardPayload::Pairs(last) = read_shard(&summary.shards[2]).unwrap() else {
        panic!("raw mode should write text pairs");
    };
    assert_eq!(last[0], SentencePair::new("sentence number 20 .", "satz nummer 20 ."));
}

#[test]
fn raw_mode_builds_vocabularies_incrementally() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_corpus(
        dir.path(),
        "train",
        &["The cat sat", "The dog ran"],
        &["Die Katze sass", "Der Hund lief"],
    );

    let summary = prepare(&config(dir.path(), 10)).unwrap();
    assert_eq!(
        summary.vocabularies,
        vec![
            dir.path().join("en-lang-train.dict"),
            dir.path().join("de-lang-train.dict")
        ]
    );

    let en = Vocabulary::load(dir.path().join("en-lang-train.dict")).unwrap();
    assert_eq!(en.name(), "en");
    assert_eq!(en.id_of("the"), Some(4));
    assert_eq!(en.id_of("cat"), Some(5));
    assert_eq!(en.id_of("sat"), Some(6));
    assert_eq!(en.id_of("dog"), Some(7));
    assert_eq!(en.id_of("ran"), Some(8));
    assert_eq!(en.count_of("the"), 2);
    assert_eq!(en.encode("the cat flew"), vec![4, 5, UNK, EOS]);

    let de = Vocabulary::load(dir.path().join("de-lang-train.dict")).unwrap();
    assert_eq!(de.len(), 4 + 6);
    assert_eq!(summary.source_vocab_len, 9);
    assert_eq!(summary.target_vocab_len, 10);
}

#[test]
fn exact_multiple_of_shard_size_writes_no_empty_shard() {
    let dir = tempfile::tempdir().unwrap();
    numbered_corpus(dir.path(), "train", 20);

    let summary = prepare(&config(dir.path(), 10)).unwrap();
    assert_eq!(summary.shards.len(), 2);
    assert!(!dir
        .path()
        .join("sentence-pairs-en-de-shard-2.pairs.json")
        .exists());
}

#[test]
fn empty_corpus_writes_only_vocabularies() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), "train", &[], &[]);

    let summary = prepare(&config(dir.path(), 10)).unwrap();

    assert_eq!(summary.pairs, 0);
    assert!(summary.shards.is_empty());

    let mut files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec!["de-lang-train.dict", "en-lang-train.dict", "train.de", "train.en"]
    );

    let en = Vocabulary::load(dir.path().join("en-lang-train.dict")).unwrap();
    assert!(en.is_empty());
}

#[test]
fn vectorized_mode_packs_every_shard() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_corpus(
        dir.path(),
        "train",
        &["The cat sat.", "A dog", "Zebras run fast!"],
        &["Die Katze sass.", "Ein Hund", "Zebras rennen"],
    );

    let summary = prepare(&vectorized(dir.path(), 2)).unwrap();
    assert_eq!(summary.shards.len(), 2);
    assert!(summary.shards[0].ends_with("sentence-pairs-en-de-shard-0.batch.json"));

    let en = Vocabulary::load(dir.path().join("en-lang-train.dict")).unwrap();
    let de = Vocabulary::load(dir.path().join("de-lang-train.dict")).unwrap();

    let ShardPayload::Packed(first) = read_shard(&summary.shards[0]).unwrap() else {
        panic!("vectorized mode should write packed batches");
    };
    assert_eq!(first.indexes, vec![0, 1]);
    assert_eq!(first.source_lengths, vec![5, 3]);
    assert_eq!(en.decode(&first.source[0]), vec!["the", "cat", "sat", ".", "<eos>"]);
    assert_eq!(
        en.decode(&first.source[1]),
        vec!["a", "dog", "<eos>", "<pad>", "<pad>"]
    );

    let ShardPayload::Packed(second) = read_shard(&summary.shards[1]).unwrap() else {
        panic!("vectorized mode should write packed batches");
    };
    assert_eq!(second.indexes, vec![2]);
    assert_eq!(de.decode(&second.target[0]), vec!["zebras", "rennen", "<eos>"]);

    // The whole corpus was indexed before anything was packed
    for batch in [&first, &second] {
        assert!(batch.source.iter().flatten().all(|&id| id != UNK));
        assert!(batch.target.iter().flatten().all(|&id| id != UNK));
    }
}

#[test]
fn held_out_split_reuses_training_vocabularies() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), "train", &["the cat sat"], &["die katze sass"]);
    write_corpus(dir.path(), "valid", &["the bird sat"], &["der vogel sass"]);

    prepare(&vectorized(dir.path(), 10)).unwrap();
    let before = std::fs::read(dir.path().join("en-lang-train.dict")).unwrap();

    let valid = PrepareConfig {
        name: "valid".to_string(),
        vocab_source: VocabSource::Reuse {
            name: "train".to_string(),
        },
        ..vectorized(dir.path(), 10)
    };
    let summary = prepare(&valid).unwrap();

    assert!(summary.vocabularies.is_empty());
    assert!(!dir.path().join("en-lang-valid.dict").exists());
    assert_eq!(
        std::fs::read(dir.path().join("en-lang-train.dict")).unwrap(),
        before
    );

    let ShardPayload::Packed(batch) = read_shard(&summary.shards[0]).unwrap() else {
        panic!("vectorized mode should write packed batches");
    };
    assert_eq!(batch.source[0], vec![4, UNK, 6, EOS]);
    assert_eq!(batch.target[0], vec![UNK, UNK, 6, EOS]);
}

#[test]
fn misaligned_corpus_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), "train", &["a", "b", "c"], &["x", "y"]);

    let err = prepare(&config(dir.path(), 10)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MisalignedCorpus);
    assert_matches!(
        err,
        BitextError::MisalignedCorpus {
            source_lines: 3,
            target_lines: 2,
            ..
        }
    );

    // Nothing is persisted for a run that failed
    assert!(!dir.path().join("en-lang-train.dict").exists());
}

#[test]
fn missing_corpus_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = prepare(&config(dir.path(), 10)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let err = prepare(&vectorized(dir.path(), 10)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn index_corpus_builds_one_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), "train", &["The cat sat", "", "the dog ran"], &["", "", ""]);

    let vocab = index_corpus(dir.path().join("train.en"), "en").unwrap();
    assert_eq!(vocab.most_frequent(1), vec![("the", 2)]);
    assert_eq!(vocab.len(), 9);
}
