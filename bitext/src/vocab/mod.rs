//! Per-language vocabularies: a growable, bidirectional mapping between tokens and ids, with a
//! frequency count for every token.
use crate::token::{SpecialToken, TokenId, EOS, UNK};
use crate::Result;
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::*;

mod file;
mod hash;

pub use file::VOCABULARY_FORMAT_VERSION;
pub(crate) use hash::{TokenDecoder, TokenEncoder};

/// The vocabulary of one language.
///
/// Every vocabulary starts out with the [`SpecialToken`]s occupying the first ids.  Corpus tokens
/// then receive ids densely, in the order they are first seen by [`Self::index`], and keep them
/// for the life of the vocabulary, including across [`Self::save`] and [`Self::load`].
///
/// Indexing takes `&mut self`; once a vocabulary is built it is shared immutably for encoding, so
/// ids can never be handed out concurrently.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    /// Identifies the language, usually its two-letter code
    name: String,

    /// Token string to id
    encoder: TokenEncoder,

    /// Id to token string.  Always the exact inverse of `encoder`.
    decoder: TokenDecoder,

    /// Occurrence count of each token, indexed by id.  Reserved tokens always stay at zero.
    counts: Vec<u64>,
}

impl Vocabulary {
    pub fn new(name: impl Into<String>) -> Self {
        let mut encoder = TokenEncoder::default();
        let mut decoder = TokenDecoder::default();

        for special in SpecialToken::iter() {
            let token = special.to_string();
            let id = decoder.push(&token);
            debug_assert_eq!(id, Some(special.id()));
            encoder.insert(&token, special.id());
        }

        Self {
            name: name.into(),
            encoder,
            decoder,
            counts: vec![0; SpecialToken::COUNT],
        }
    }

    /// Reassemble a vocabulary from tables that have already been checked to agree with each
    /// other.
    pub(crate) fn from_parts(
        name: String,
        encoder: TokenEncoder,
        decoder: TokenDecoder,
        counts: Vec<u64>,
    ) -> Self {
        debug_assert_eq!(encoder.len(), decoder.len());
        debug_assert_eq!(decoder.len(), counts.len());

        Self {
            name,
            encoder,
            decoder,
            counts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of ids in use, reserved ids included
    pub fn len(&self) -> usize {
        self.decoder.len()
    }

    /// `true` if no corpus token has been indexed yet
    pub fn is_empty(&self) -> bool {
        self.len() == SpecialToken::COUNT
    }

    /// The id the next previously unseen token will be assigned, or `None` once every id is taken
    pub fn next_id(&self) -> Option<TokenId> {
        self.decoder.next_id()
    }

    /// Add the whitespace-separated tokens of `text` to the vocabulary.
    ///
    /// Tokens seen for the first time get the next free id and a count of one; tokens already
    /// present have their count incremented.  Empty text is a no-op.
    ///
    /// The literal strings of the reserved tokens are not corpus tokens: they are skipped, so
    /// their ids and counts never change.  Once every id is taken, new tokens are dropped and
    /// logged as errors.
    pub fn index(&mut self, text: &str) {
        for token in text.split_whitespace() {
            match self.encoder.id_for_token(token) {
                Some(id) if is_reserved(id) => {
                    debug!(vocab = %self.name, token, "skipping reserved token string");
                }
                Some(id) => self.counts[id as usize] += 1,
                None => match self.decoder.push(token) {
                    Some(id) => {
                        self.encoder.insert(token, id);
                        self.counts.push(1);
                        trace!(vocab = %self.name, token, id, "new token");
                    }
                    None => {
                        error!(vocab = %self.name, token, len = self.len(),
                            "Vocabulary has no free ids left; token not indexed");
                    }
                },
            }
        }
    }

    /// Encode `text` into token ids, terminated by the end-of-sequence id.
    ///
    /// Tokens that were never indexed encode as the unknown-token id, and so does the literal
    /// string of a reserved token, so reserved ids only ever appear where the encoder or packer
    /// put them.  This never fails: held-out text is expected to contain words the vocabulary has
    /// not seen.
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        text.split_whitespace()
            .map(|token| {
                self.encoder
                    .id_for_token(token)
                    .filter(|&id| !is_reserved(id))
                    .unwrap_or(UNK)
            })
            .chain(std::iter::once(EOS))
            .collect()
    }

    /// The token strings corresponding to `ids`.  Ids outside the vocabulary decode as `<unk>`.
    pub fn decode(&self, ids: &[TokenId]) -> Vec<&str> {
        ids.iter()
            .map(|&id| {
                self.decoder
                    .token_for_id(id)
                    .unwrap_or_else(|| self.decoder.token_for_id(UNK).unwrap_or("<unk>"))
            })
            .collect()
    }

    pub fn id_of(&self, token: &str) -> Option<TokenId> {
        self.encoder.id_for_token(token)
    }

    pub fn token_of(&self, id: TokenId) -> Option<&str> {
        self.decoder.token_for_id(id)
    }

    /// How many times `token` has been indexed.  Zero for unknown tokens.
    pub fn count_of(&self, token: &str) -> u64 {
        self.id_of(token)
            .map(|id| self.counts[id as usize])
            .unwrap_or(0)
    }

    /// Every `(id, token, count)` in id order, reserved tokens first
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &str, u64)> {
        self.decoder
            .tokens()
            .zip(self.counts.iter())
            .enumerate()
            .map(|(id, (token, count))| (id as TokenId, token, *count))
    }

    /// The `n` most frequent corpus tokens, most frequent first.  Ties go to the token seen first.
    pub fn most_frequent(&self, n: usize) -> Vec<(&str, u64)> {
        let mut tokens: Vec<_> = self
            .iter()
            .skip(SpecialToken::COUNT)
            .map(|(_, token, count)| (token, count))
            .collect();

        // Stable sort, so equal counts stay in id order
        tokens.sort_by(|a, b| b.1.cmp(&a.1));
        tokens.truncate(n);
        tokens
    }

    /// Total number of tokens indexed, counting repeats
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Persist the complete state of this vocabulary to `path`.
    ///
    /// The write is atomic: either the complete file is in place afterwards, or the call fails and
    /// whatever was at `path` before is untouched.
    #[instrument(skip_all, fields(vocab = %self.name, tokens = self.len()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        crate::persist::write_json_atomic(path, &file::VocabularyFile::from(self))?;
        info!(path = %path.display(), "saved vocabulary");
        Ok(())
    }

    /// Load a vocabulary previously written by [`Self::save`].
    ///
    /// The file is checked for internal consistency; a file that can't reproduce exactly the ids
    /// it was saved with is rejected rather than patched up.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let vocab = crate::persist::read_json::<file::VocabularyFile>(path)?.into_vocabulary(path)?;
        info!(path = %path.display(), vocab = %vocab.name, tokens = vocab.len(), "loaded vocabulary");
        Ok(vocab)
    }
}

fn is_reserved(id: TokenId) -> bool {
    (id as usize) < SpecialToken::COUNT
}
