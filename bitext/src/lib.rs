//! Prepares parallel corpora for training sequence-to-sequence translation models.
//!
//! A run reads two line-aligned text files (one per language), builds a [`Vocabulary`] for each
//! language, and writes the corpus back out as numbered shards: either normalized text pairs, or
//! [`PackedBatch`]es of padded token ids ready to be turned into tensors.  See [`prepare`] for the
//! whole pipeline; the pieces are usable on their own.
mod batch;
mod corpus;
mod error;
mod normalize;
mod persist;
mod pipeline;
mod shard;
mod token;
mod vocab;

pub use batch::*;
pub use corpus::*;
pub use error::*;
pub use normalize::*;
pub use pipeline::*;
pub use shard::*;
pub use token::*;
pub use vocab::*;

pub type Result<T> = std::result::Result<T, BitextError>;

#[cfg(test)]
pub mod test_helpers {
    use std::sync::OnceLock;
    use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

    static TRACING: OnceLock<()> = OnceLock::new();

    /// Initialize tracing for tests with a stdout subscriber.
    /// Safe to call multiple times - will only initialize once.
    pub fn init_test_logging() {
        TRACING.get_or_init(|| {
            let filter = std::env::var("RUST_LOG")
                .map(EnvFilter::new)
                .unwrap_or_else(|_| EnvFilter::new("debug"));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_test_writer()
                .try_init()
                .ok();
        });
    }
}
