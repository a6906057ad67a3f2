//! The on-disk representation of a [`Vocabulary`].
//!
//! A vocabulary file is a JSON document that carries everything needed to rebuild the in-memory
//! tables exactly: the reserved-id layout it was built with, every token in id order, and the
//! count of every counted token.  Counts are keyed by token string in sorted order, so a file can
//! be read (and diffed) without knowing anything about ids.
use super::{TokenDecoder, Vocabulary};
use crate::error::*;
use crate::token::{SpecialToken, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strum::IntoEnumIterator;

/// Bumped whenever the layout of the file changes incompatibly
pub const VOCABULARY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct VocabularyFile {
    format_version: u32,
    name: String,
    reserved: Vec<ReservedEntry>,
    index_to_token: Vec<String>,
    token_count: BTreeMap<String, u64>,
}

#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
struct ReservedEntry {
    token: SpecialToken,
    id: TokenId,
}

fn reserved_layout() -> Vec<ReservedEntry> {
    SpecialToken::iter()
        .map(|token| ReservedEntry {
            token,
            id: token.id(),
        })
        .collect()
}

impl From<&Vocabulary> for VocabularyFile {
    fn from(vocab: &Vocabulary) -> Self {
        Self {
            format_version: VOCABULARY_FORMAT_VERSION,
            name: vocab.name.clone(),
            reserved: reserved_layout(),
            index_to_token: vocab.decoder.tokens().map(str::to_owned).collect(),
            token_count: vocab
                .iter()
                .filter(|(_, _, count)| *count > 0)
                .map(|(_, token, count)| (token.to_owned(), count))
                .collect(),
        }
    }
}

impl VocabularyFile {
    /// Validate the file contents and rebuild the vocabulary they describe.
    pub(super) fn into_vocabulary(self, path: &Path) -> crate::Result<Vocabulary> {
        let invalid = |reason: String| InvalidVocabularySnafu { path, reason }.build();

        if self.format_version != VOCABULARY_FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported format version {} (expected {VOCABULARY_FORMAT_VERSION})",
                self.format_version
            )));
        }

        if self.reserved != reserved_layout() {
            return Err(invalid(format!(
                "reserved id layout {:?} does not match the expected layout",
                self.reserved
            )));
        }

        if self.index_to_token.len() > TokenId::MAX as usize {
            return Err(invalid(format!(
                "{} tokens is more than a vocabulary can hold",
                self.index_to_token.len()
            )));
        }

        for special in SpecialToken::iter() {
            let expected = special.to_string();
            match self.index_to_token.get(special.id() as usize) {
                Some(token) if *token == expected => {}
                other => {
                    return Err(invalid(format!(
                        "id {} should be {expected} but is {other:?}",
                        special.id()
                    )))
                }
            }
        }

        let decoder: TokenDecoder = self.index_to_token.into_iter().collect();
        let encoder = decoder
            .invert()
            .map_err(|token| invalid(format!("token '{token}' appears more than once")))?;

        let mut counts = vec![0u64; decoder.len()];
        for (token, count) in self.token_count {
            let id = encoder
                .id_for_token(&token)
                .ok_or_else(|| invalid(format!("count given for unknown token '{token}'")))?;
            if (id as usize) < SpecialToken::COUNT {
                return Err(invalid(format!("count given for reserved token '{token}'")));
            }
            counts[id as usize] = count;
        }

        if let Some((id, _)) = counts
            .iter()
            .enumerate()
            .skip(SpecialToken::COUNT)
            .find(|(_, count)| **count == 0)
        {
            return Err(invalid(format!(
                "token '{}' has no count",
                decoder.token_for_id(id as TokenId).unwrap_or_default()
            )));
        }

        Ok(Vocabulary::from_parts(self.name, encoder, decoder, counts))
    }
}
