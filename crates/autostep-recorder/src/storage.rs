//! Recording persistence - one pretty-printed JSON document per recording

use crate::events::RecordingMetadata;
use autostep_core::{Error, ErrorCode, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_DIR: &str = "recordings";
pub const EXTENSION: &str = "json";

/// Write `metadata` as a single self-describing JSON document
pub fn save<W: Write>(metadata: &RecordingMetadata, sink: W) -> Result<()> {
    let mut w = BufWriter::new(sink);
    serde_json::to_writer_pretty(&mut w, metadata).map_err(json_error)?;
    w.flush()?;
    Ok(())
}

/// Read a recording, failing fast on anything that is not well formed
pub fn load<R: Read>(source: R) -> Result<RecordingMetadata> {
    let metadata: RecordingMetadata =
        serde_json::from_reader(BufReader::new(source)).map_err(json_error)?;
    if metadata.capture_width == 0 || metadata.capture_height == 0 {
        return Err(Error::malformed(format!(
            "screen size {}x{} must be positive",
            metadata.capture_width, metadata.capture_height
        )));
    }
    Ok(metadata)
}

fn json_error(e: serde_json::Error) -> Error {
    if e.is_io() {
        Error::new(ErrorCode::Io, e.to_string())
    } else {
        Error::malformed(e)
    }
}

/// Directory of saved recordings
pub struct RecordingStorage {
    dir: PathBuf,
}

impl RecordingStorage {
    /// `./recordings`, created if missing
    pub fn new() -> Result<Self> {
        Self::with_dir(DEFAULT_DIR)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Save under `name` (extension added if missing) or a timestamped name
    pub fn save(&self, metadata: &RecordingMetadata, name: Option<&str>) -> Result<PathBuf> {
        let filename = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => with_extension(&sanitize(n)),
            None => format!(
                "recording_{}.{}",
                chrono::Local::now().format("%Y%m%d_%H%M%S"),
                EXTENSION
            ),
        };
        let path = self.dir.join(filename);
        save(metadata, File::create(&path)?)?;
        tracing::info!(path = %path.display(), events = metadata.events.len(), "saved recording");
        Ok(path)
    }

    /// Load a recording by file name inside the directory
    pub fn load(&self, filename: &str) -> Result<RecordingMetadata> {
        self.load_path(self.dir.join(filename))
    }

    /// Load a recording from anywhere on disk
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<RecordingMetadata> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::new(ErrorCode::Io, format!("{}: {}", path.display(), e)))?;
        load(file).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "could not load recording");
            e
        })
    }

    /// All `.json` files in the directory, sorted by name
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(s) = entry.file_name().to_str() {
                files.push(s.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, filename: &str) -> Result<()> {
        fs::remove_file(self.dir.join(filename))?;
        tracing::info!(filename, "deleted recording");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn with_extension(name: &str) -> String {
    if name.ends_with(&format!(".{}", EXTENSION)) {
        name.to_string()
    } else {
        format!("{}.{}", name, EXTENSION)
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
