use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator};

/// A token in its integer form: the id the vocabulary assigned to it.
///
/// Ids are dense, so the largest id in a vocabulary is always `len() - 1`.  `u32` leaves room for
/// any realistic vocabulary and keeps packed batches compact on disk and in the trainer.
pub type TokenId = u32;

/// The sentinel tokens every vocabulary reserves before it sees any corpus text.
///
/// The discriminant of each variant is its id, so downstream code can rely on the numeric values
/// without consulting a vocabulary.  Their string forms contain characters the normalizer never
/// emits, which keeps them out of reach of corpus text.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    EnumString,
    strum::Display,
    Serialize,
    Deserialize,
)]
pub enum SpecialToken {
    /// Fills the tail of every row shorter than the longest row in a packed batch
    #[strum(serialize = "<pad>")]
    #[serde(rename = "<pad>")]
    Pad = 0,

    /// Stands in for any token the vocabulary has never seen
    #[strum(serialize = "<unk>")]
    #[serde(rename = "<unk>")]
    Unknown = 1,

    /// Start of sequence.  Reserved for the decoder side of the model; never emitted here.
    #[strum(serialize = "<sos>")]
    #[serde(rename = "<sos>")]
    StartOfSequence = 2,

    /// Terminates every encoded sequence
    #[strum(serialize = "<eos>")]
    #[serde(rename = "<eos>")]
    EndOfSequence = 3,
}

impl SpecialToken {
    /// Number of ids reserved at the start of every vocabulary
    pub const COUNT: usize = 4;

    pub const fn id(self) -> TokenId {
        self as TokenId
    }

    /// The special token occupying `id`, if `id` is in the reserved block
    pub fn from_id(id: TokenId) -> Option<Self> {
        Self::iter().find(|special| special.id() == id)
    }
}

pub const PAD: TokenId = SpecialToken::Pad.id();
pub const UNK: TokenId = SpecialToken::Unknown.id();
pub const SOS: TokenId = SpecialToken::StartOfSequence.id();
pub const EOS: TokenId = SpecialToken::EndOfSequence.id();
