//! Line normalization applied to every corpus line before it is indexed, packed, or written out.
//!
//! The character-class policy:
//!
//! - letters (`\p{L}`), combining marks (`\p{M}`) and numbers (`\p{N}`) are word characters and
//!   are kept, lowercased.  Accented letters survive, so German or French text is not mangled.
//! - `.` `,` `!` `?` `;` `:` are punctuation tokens and always stand alone, separated from the
//!   surrounding words by a space.
//! - everything else (symbols, quotes, brackets, control characters, any kind of whitespace) is a
//!   separator.  Runs of separators collapse into a single ASCII space, and separators at either
//!   end of the line are dropped.
//!
//! The result is always either empty or a sequence of tokens joined by single spaces, which is
//! exactly what [`crate::Vocabulary`] tokenizes on.
use once_cell::sync::Lazy;
use regex::Regex;

/// Punctuation that is kept and split off into its own token
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.,!?;:])").expect("BUG: invalid punctuation regex"));

/// Anything that is neither a word character nor kept punctuation
static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\p{L}\p{M}\p{N}.,!?;:]+").expect("BUG: invalid noise regex")
});

/// Normalize one raw line of corpus text.
///
/// Total and deterministic; `normalize(normalize(s)) == normalize(s)` for every `s`.  An empty
/// line (or a line with nothing but noise) normalizes to the empty string.
pub fn normalize(line: &str) -> String {
    let line = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line);

    let lowered = line.to_lowercase();
    let spaced = PUNCTUATION.replace_all(&lowered, " $1 ");
    let cleaned = NOISE.replace_all(&spaced, " ");

    cleaned.split(' ').filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}
