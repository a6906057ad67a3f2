//! Streams aligned sentence pairs out of two parallel, line-aligned text files.
use crate::error::*;
use crate::normalize::normalize;
use crate::Result;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::*;

/// One line of the source file and the corresponding line of the target file, both normalized.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SentencePair {
    pub source: String,
    pub target: String,
}

impl SentencePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Reads lines from one side of the corpus and keeps track of how many it has seen
pub(crate) struct LineReader<R> {
    reader: R,
    path: PathBuf,
    buf: Vec<u8>,
    lines: usize,
    warned_lossy: bool,
}

impl LineReader<BufReader<File>> {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).context(FileIoSnafu { path })?;
        Ok(Self::new(BufReader::new(file), path.to_path_buf()))
    }
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R, path: PathBuf) -> Self {
        Self {
            reader,
            path,
            buf: Vec::new(),
            lines: 0,
            warned_lossy: false,
        }
    }

    /// The next raw line, or `None` at end of file.  A blank line is `Some("\n")`, never `None`.
    pub(crate) fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .with_context(|_| FileIoSnafu {
                path: self.path.clone(),
            })?;

        if read == 0 {
            return Ok(None);
        }
        self.lines += 1;

        let line = match String::from_utf8_lossy(&self.buf) {
            Cow::Borrowed(line) => line.to_owned(),
            Cow::Owned(line) => {
                // The replacement characters are noise to the normalizer, so the words around
                // them survive, but the text is no longer exactly what was in the file
                if !self.warned_lossy {
                    warn!(path = %self.path.display(), line = self.lines,
                        "Input file did not decode as clean UTF-8.  \
                        Invalid bytes have been replaced; further occurrences in this file will not be reported");
                    self.warned_lossy = true;
                }
                line
            }
        };

        Ok(Some(line))
    }

    /// Consume the rest of the input, returning the total number of lines it held
    fn count_to_end(&mut self) -> Result<usize> {
        while self.next_line()?.is_some() {}
        Ok(self.lines)
    }
}

/// Yields the sentence pairs of a parallel corpus in order.
///
/// The two inputs must be aligned line for line.  Alignment can't be verified pair by pair, but
/// the reader does insist both sides end at the same line: if either runs out first the result is
/// [`BitextError::MisalignedCorpus`] rather than a silently truncated corpus.
pub struct CorpusReader<S, T> {
    source: LineReader<S>,
    target: LineReader<T>,
    pairs_read: usize,
    finished: bool,
}

impl CorpusReader<BufReader<File>, BufReader<File>> {
    /// Open the source and target files of a corpus.
    pub fn open(source_path: impl AsRef<Path>, target_path: impl AsRef<Path>) -> Result<Self> {
        let source_path = source_path.as_ref();
        let target_path = target_path.as_ref();
        debug!(source = %source_path.display(), target = %target_path.display(), "opening corpus");

        Ok(Self {
            source: LineReader::open(source_path)?,
            target: LineReader::open(target_path)?,
            pairs_read: 0,
            finished: false,
        })
    }
}

impl<S: BufRead, T: BufRead> CorpusReader<S, T> {
    /// Read a corpus from arbitrary readers.  The paths are only used in error messages.
    pub fn new(
        source: S,
        source_path: impl Into<PathBuf>,
        target: T,
        target_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: LineReader::new(source, source_path.into()),
            target: LineReader::new(target, target_path.into()),
            pairs_read: 0,
            finished: false,
        }
    }

    /// Number of pairs yielded so far
    pub fn pairs_read(&self) -> usize {
        self.pairs_read
    }

    /// Read the next pair, or `None` once both files are exhausted.
    pub fn next_pair(&mut self) -> Result<Option<SentencePair>> {
        if self.finished {
            return Ok(None);
        }

        let source = self.source.next_line()?;
        let target = self.target.next_line()?;

        match (source, target) {
            (Some(source), Some(target)) => {
                self.pairs_read += 1;
                Ok(Some(SentencePair {
                    source: normalize(&source),
                    target: normalize(&target),
                }))
            }
            (None, None) => {
                self.finished = true;
                debug!(pairs = self.pairs_read, "end of corpus");
                Ok(None)
            }
            (None, Some(_)) | (Some(_), None) => {
                self.finished = true;
                let source_lines = self.source.count_to_end()?;
                let target_lines = self.target.count_to_end()?;
                error!(source_lines, target_lines, "source and target line counts differ");

                MisalignedCorpusSnafu {
                    source_path: self.source.path.clone(),
                    target_path: self.target.path.clone(),
                    source_lines,
                    target_lines,
                }
                .fail()
            }
        }
    }
}

impl<S: BufRead, T: BufRead> Iterator for CorpusReader<S, T> {
    type Item = Result<SentencePair>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_pair() {
            Ok(pair) => pair.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
