//! Reading and writing the JSON artifacts this crate produces.
//!
//! Writes go to a temporary file in the destination directory which is renamed over the final
//! path only once it is completely written and flushed, so a crashed or failed run never leaves a
//! truncated vocabulary or shard behind.
use crate::error::*;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::ResultExt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::*;

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    // `Path::parent` returns an empty path for bare file names; that means the current directory
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp = tempfile::NamedTempFile::new_in(dir).context(FileIoSnafu { path: dir })?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, value).context(JsonSnafu { path })?;
        writer.flush().context(FileIoSnafu { path })?;
    }
    tmp.as_file().sync_all().context(FileIoSnafu { path })?;

    tmp.persist(path).context(PersistSnafu { path })?;
    debug!(path = %path.display(), "wrote file");

    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).context(FileIoSnafu { path })?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).context(JsonSnafu { path })
}
