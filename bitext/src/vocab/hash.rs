//! The lookup tables that map token strings to ids and back.
//!
//! Encoding is a hash lookup per token for every line of the corpus, so the choice of hash
//! function matters.  It is isolated to this module to make it easier to experiment with
//! different impls.
use crate::token::TokenId;

pub use rustc_hash::FxHashMap as HashMap;

/// Maintains the mapping from token strings to the ids assigned to them.
#[derive(Clone, Debug, Default)]
pub(crate) struct TokenEncoder(HashMap<String, TokenId>);

/// Maintains the reverse mapping, from id to token string.
///
/// Ids are dense, so a vector indexed by id is the whole table.
#[derive(Clone, Debug, Default)]
pub(crate) struct TokenDecoder(Vec<String>);

impl TokenEncoder {
    pub fn id_for_token(&self, token: &str) -> Option<TokenId> {
        self.0.get(token).copied()
    }

    /// Record `token` under `id`.  Returns `false` without modifying the table if the token was
    /// already present.
    pub fn insert(&mut self, token: &str, id: TokenId) -> bool {
        if self.0.contains_key(token) {
            return false;
        }
        self.0.insert(token.to_owned(), id);
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl TokenDecoder {
    /// The id the next pushed token will receive, or `None` if the table is full
    pub fn next_id(&self) -> Option<TokenId> {
        id_for_len(self.0.len())
    }

    /// Append `token`, returning its id.  Returns `None` and leaves the table unchanged if every
    /// id is already taken.
    pub fn push(&mut self, token: &str) -> Option<TokenId> {
        let id = self.next_id()?;
        self.0.push(token.to_owned());
        Some(id)
    }

    pub fn token_for_id(&self, id: TokenId) -> Option<&str> {
        self.0.get(id as usize).map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Build the matching encoder.
    ///
    /// Fails with the offending token if any token appears twice, since that would make the two
    /// tables disagree.
    pub fn invert(&self) -> std::result::Result<TokenEncoder, String> {
        let mut encoder = TokenEncoder(HashMap::with_capacity_and_hasher(
            self.0.len(),
            Default::default(),
        ));
        for (id, token) in self.0.iter().enumerate() {
            if !encoder.insert(token, id as TokenId) {
                return Err(token.clone());
            }
        }
        Ok(encoder)
    }
}

/// The id of the next token appended to a table that already holds `len` tokens.
///
/// `TokenId::MAX` itself is never handed out, so a full table still has a length that fits in a
/// `TokenId`.
fn id_for_len(len: usize) -> Option<TokenId> {
    TokenId::try_from(len).ok().filter(|&id| id != TokenId::MAX)
}

impl FromIterator<String> for TokenDecoder {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_never_wrap() {
        assert_eq!(id_for_len(0), Some(0));
        assert_eq!(id_for_len(4), Some(4));
        assert_eq!(id_for_len(TokenId::MAX as usize - 1), Some(TokenId::MAX - 1));
        assert_eq!(id_for_len(TokenId::MAX as usize), None);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(id_for_len(TokenId::MAX as usize + 1), None);
    }

    #[test]
    fn push_assigns_dense_ids() {
        let mut decoder = TokenDecoder::default();
        assert_eq!(decoder.push("a"), Some(0));
        assert_eq!(decoder.push("b"), Some(1));
        assert_eq!(decoder.next_id(), Some(2));
        assert_eq!(decoder.token_for_id(1), Some("b"));
    }
}
