//! Turns batches of sentence pairs into rectangular, padded arrays of token ids.
use crate::corpus::SentencePair;
use crate::token::{TokenId, PAD};
use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};

/// A batch of sentence pairs encoded as token ids.
///
/// `source` and `target` are rectangular: every row is padded on the right with the padding id to
/// the length of the longest row in the same field.  The length vectors give the true number of
/// tokens in each row (end-of-sequence included, padding excluded), which is everything a trainer
/// needs to build attention masks or pack padded sequences.
///
/// Rows are in the same order as the pairs they were packed from.  Nothing here sorts by length;
/// that is left to whatever consumes the batch.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PackedBatch {
    /// Zero-based line number in the corpus of the pair each row came from
    pub indexes: Vec<usize>,
    pub source: Vec<Vec<TokenId>>,
    pub target: Vec<Vec<TokenId>>,
    pub source_lengths: Vec<usize>,
    pub target_lengths: Vec<usize>,
}

impl PackedBatch {
    /// Number of pairs in the batch
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Width of every row in `source`
    pub fn max_source_len(&self) -> usize {
        self.source_lengths.iter().copied().max().unwrap_or(0)
    }

    /// Width of every row in `target`
    pub fn max_target_len(&self) -> usize {
        self.target_lengths.iter().copied().max().unwrap_or(0)
    }

    /// 1 for every real token in `source`, 0 for every padding position
    pub fn source_mask(&self) -> Vec<Vec<u8>> {
        mask(&self.source_lengths, self.max_source_len())
    }

    /// 1 for every real token in `target`, 0 for every padding position
    pub fn target_mask(&self) -> Vec<Vec<u8>> {
        mask(&self.target_lengths, self.max_target_len())
    }

    /// Check every structural invariant of a packed batch, describing the first one that's
    /// violated.
    ///
    /// Batches built by [`BatchPacker`] always pass.  This exists for batches that came from
    /// somewhere else, such as a shard file on disk.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.len();
        for (field, len) in [
            ("source", self.source.len()),
            ("target", self.target.len()),
            ("source_lengths", self.source_lengths.len()),
            ("target_lengths", self.target_lengths.len()),
        ] {
            if len != n {
                return Err(format!("{field} has {len} rows but the batch has {n} pairs"));
            }
        }

        check_rows("source", &self.source, &self.source_lengths)?;
        check_rows("target", &self.target, &self.target_lengths)
    }
}

fn mask(lengths: &[usize], width: usize) -> Vec<Vec<u8>> {
    lengths
        .iter()
        .map(|&len| {
            let mut row = vec![1u8; len];
            row.resize(width, 0);
            row
        })
        .collect()
}

fn check_rows(
    field: &str,
    rows: &[Vec<TokenId>],
    lengths: &[usize],
) -> std::result::Result<(), String> {
    let width = lengths.iter().copied().max().unwrap_or(0);

    for (row_index, (row, &len)) in rows.iter().zip(lengths).enumerate() {
        if row.len() != width {
            return Err(format!(
                "{field} row {row_index} has width {} but the batch width is {width}",
                row.len()
            ));
        }
        // Every encoded sequence has at least its end-of-sequence token
        if len == 0 {
            return Err(format!("{field} row {row_index} has length 0"));
        }
        if row[..len].contains(&PAD) || row[len..].iter().any(|&id| id != PAD) {
            return Err(format!(
                "{field} row {row_index} padding does not match its length {len}"
            ));
        }
    }

    Ok(())
}

/// Packs sentence pairs using a fixed pair of vocabularies.
///
/// The vocabularies are borrowed immutably, so they must be completely built before packing
/// starts.  Any token they don't know encodes as the unknown-token id.
#[derive(Clone, Copy, Debug)]
pub struct BatchPacker<'a> {
    source: &'a Vocabulary,
    target: &'a Vocabulary,
}

impl<'a> BatchPacker<'a> {
    pub fn new(source: &'a Vocabulary, target: &'a Vocabulary) -> Self {
        Self { source, target }
    }

    /// Pack `pairs`, numbering the rows from zero.
    pub fn pack(&self, pairs: &[SentencePair]) -> PackedBatch {
        self.pack_from(0, pairs)
    }

    /// Pack `pairs`, given that the first of them is line `first_index` of the corpus.
    pub fn pack_from(&self, first_index: usize, pairs: &[SentencePair]) -> PackedBatch {
        let (source, source_lengths) =
            encode_padded(self.source, pairs.iter().map(|p| p.source.as_str()));
        let (target, target_lengths) =
            encode_padded(self.target, pairs.iter().map(|p| p.target.as_str()));

        PackedBatch {
            indexes: (first_index..first_index + pairs.len()).collect(),
            source,
            target,
            source_lengths,
            target_lengths,
        }
    }
}

/// Encode each text and right-pad the results to a common width
fn encode_padded<'t>(
    vocab: &Vocabulary,
    texts: impl Iterator<Item = &'t str>,
) -> (Vec<Vec<TokenId>>, Vec<usize>) {
    let mut rows: Vec<_> = texts.map(|text| vocab.encode(text)).collect();
    let lengths: Vec<_> = rows.iter().map(Vec::len).collect();
    let width = lengths.iter().copied().max().unwrap_or(0);

    for row in &mut rows {
        row.resize(width, PAD);
    }

    (rows, lengths)
}

/// Convenience wrapper around [`BatchPacker::pack`]
pub fn pack(pairs: &[SentencePair], source: &Vocabulary, target: &Vocabulary) -> PackedBatch {
    BatchPacker::new(source, target).pack(pairs)
}
