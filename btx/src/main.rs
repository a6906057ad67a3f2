use anyhow::{anyhow, Context};
use bitext::{PackingMode, PrepareConfig, ShardPayload, VocabSource, Vocabulary};
use clap::{Args, Parser, Subcommand};
use config::FileConfig;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::exit;
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

mod config;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Globals {
    /// JSON file with defaults for `--where`, `--shard-size` and `--vectorize-gpu`
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build vocabularies for a parallel corpus and write it out in shards
    ///
    /// Reads `{where}/{name}.{src}` and `{where}/{name}.{targ}`, which must have the same number of
    /// lines.
    Prepare(PrepareArgs),

    /// Build and save the vocabulary of a single corpus file
    Index(IndexArgs),

    /// Print a summary of a vocabulary or shard file
    Inspect {
        /// A `.dict` vocabulary file, or a shard file
        path: PathBuf,

        /// How many of the most frequent tokens of a vocabulary to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Directory holding the corpus.  Vocabularies and shards are written here too.
    #[arg(long = "where", value_name = "DIR", env = "BTX_WHERE")]
    corpus_dir: Option<PathBuf>,

    /// Name of the corpus split, e.g. `train`
    #[arg(long)]
    name: String,

    /// Source language code, which is also the source file extension
    #[arg(long = "src", value_name = "LANG")]
    source_lang: String,

    /// Target language code, which is also the target file extension
    #[arg(long = "targ", value_name = "LANG")]
    target_lang: String,

    /// Maximum number of sentence pairs per shard [default: 10000]
    #[arg(long, value_name = "N", env = "BTX_SHARD_SIZE")]
    shard_size: Option<NonZeroUsize>,

    /// Write packed batches of token ids for this device instead of text pairs
    #[arg(long, value_name = "DEVICE")]
    vectorize_gpu: Option<String>,

    /// Encode with the vocabularies already built for corpus split NAME instead of building new
    /// ones.  Requires vectorized output.
    #[arg(long, value_name = "NAME")]
    vocab_from: Option<String>,
}

impl PrepareArgs {
    /// Combine the command line with the config file.  The command line wins.
    fn into_config(self, defaults: FileConfig) -> anyhow::Result<PrepareConfig> {
        let corpus_dir = self
            .corpus_dir
            .or(defaults.corpus_dir)
            .ok_or_else(|| anyhow!("No corpus directory given; use --where or set it in the config file"))?;

        let mut config =
            PrepareConfig::new(corpus_dir, self.name, self.source_lang, self.target_lang);

        if let Some(shard_size) = self.shard_size.or(defaults.shard_size) {
            config.shard_size = shard_size;
        }
        if let Some(device) = self.vectorize_gpu.or(defaults.vectorize_gpu) {
            config.mode = PackingMode::Vectorized { device };
        }
        if let Some(name) = self.vocab_from {
            config.vocab_source = VocabSource::Reuse { name };
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Directory holding the corpus file
    #[arg(long = "where", value_name = "DIR", env = "BTX_WHERE")]
    corpus_dir: Option<PathBuf>,

    /// Corpus file, relative to the corpus directory
    #[arg(long)]
    file: PathBuf,

    /// Language code the vocabulary is named after
    #[arg(long)]
    lang: String,

    /// Where to write the vocabulary.  Defaults to `{where}/{lang}-lang-{file stem}.dict`.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

impl IndexArgs {
    /// The corpus file to read and the vocabulary file to write
    fn paths(&self, defaults: &FileConfig) -> anyhow::Result<(PathBuf, PathBuf)> {
        let dir = self
            .corpus_dir
            .as_deref()
            .or(defaults.corpus_dir.as_deref())
            .unwrap_or(Path::new("."));
        let input = dir.join(&self.file);

        let out = match &self.out {
            Some(out) => out.clone(),
            None => {
                let stem = self
                    .file
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| anyhow!("Can't name a vocabulary after '{}'", self.file.display()))?;
                bitext::vocabulary_path(dir, &self.lang, stem)
            }
        };

        Ok((input, out))
    }
}

impl Commands {
    async fn execute(self, globals: &Globals) -> anyhow::Result<()> {
        use Commands::*;
        match self {
            Prepare(args) => {
                let config = args.into_config(FileConfig::load_optional(globals.config.as_deref())?)?;
                debug!(?config, "preparing corpus");

                let summary = tokio::task::spawn_blocking(move || bitext::prepare(&config)).await??;

                println!(
                    "Prepared {} sentence pairs in {} shards",
                    summary.pairs,
                    summary.shards.len()
                );
                for shard in &summary.shards {
                    println!("  {}", shard.display());
                }
                for vocab in &summary.vocabularies {
                    println!("Vocabulary: {}", vocab.display());
                }
            }
            Index(args) => {
                let (input, out) = args.paths(&FileConfig::load_optional(globals.config.as_deref())?)?;
                let lang = args.lang;

                let vocab = tokio::task::spawn_blocking(move || -> anyhow::Result<Vocabulary> {
                    let vocab = bitext::index_corpus(&input, &lang)?;
                    vocab.save(&out)?;
                    println!("Vocabulary: {}", out.display());
                    Ok(vocab)
                })
                .await??;

                print!("{}", describe_vocabulary(&vocab, 0));
            }
            Inspect { path, top } => {
                let description = tokio::task::spawn_blocking(move || inspect(&path, top)).await??;
                print!("{description}");
            }
        }

        Ok(())
    }
}

/// Describe whatever kind of file `path` is, judging by its name
fn inspect(path: &Path, top: usize) -> anyhow::Result<String> {
    if path.extension().is_some_and(|ext| ext == "dict") {
        let vocab = Vocabulary::load(path)
            .with_context(|| format!("Failed to load vocabulary '{}'", path.display()))?;
        Ok(describe_vocabulary(&vocab, top))
    } else {
        let shard = bitext::read_shard(path)
            .with_context(|| format!("Failed to load shard '{}'", path.display()))?;
        Ok(describe_shard(&shard))
    }
}

fn describe_vocabulary(vocab: &Vocabulary, top: usize) -> String {
    let mut out = format!(
        "Vocabulary '{}': {} ids ({} reserved), {} tokens indexed\n",
        vocab.name(),
        vocab.len(),
        bitext::SpecialToken::COUNT,
        vocab.total_count()
    );

    let frequent = vocab.most_frequent(top);
    if !frequent.is_empty() {
        out.push_str("Most frequent:\n");
        for (token, count) in frequent {
            out.push_str(&format!("  {token}\t{count}\n"));
        }
    }
    out
}

fn describe_shard(shard: &ShardPayload) -> String {
    match shard {
        ShardPayload::Pairs(pairs) => {
            let mut out = format!("Text shard: {} sentence pairs\n", pairs.len());
            if let Some(first) = pairs.first() {
                out.push_str(&format!(
                    "First pair:\n  {}\n  {}\n",
                    first.source, first.target
                ));
            }
            out
        }
        ShardPayload::Packed(batch) => {
            let mut out = format!("Packed shard: {} sentence pairs\n", batch.len());
            if let (Some(first), Some(last)) = (batch.indexes.first(), batch.indexes.last()) {
                out.push_str(&format!("Corpus lines {first} to {last}\n"));
            }
            out.push_str(&format!(
                "Source rows padded to {} ids, target rows padded to {} ids\n",
                batch.max_source_len(),
                batch.max_target_len()
            ));
            out
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // JSON to stderr, so stdout only ever holds command output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Some(config_path) = cli.globals.config.as_deref() {
        debug!("Value for config: {}", config_path.display());
    }

    if let Err(e) = cli.command.execute(&cli.globals).await {
        error!("{:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}
