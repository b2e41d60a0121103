// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export destinations.
//
// Both sinks take the same `folder/NAME.ext` relative paths, so a directory
// export and an archive export of the same run have identical layouts.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use cardwerk_core::error::{CardwerkError, Result};
use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Where exported files go.
pub trait ExportSink: Send {
    /// Human-readable destination, for logs and progress messages.
    fn describe(&self) -> String;

    /// Store `bytes` at `relative_path` (`/`-separated). Never overwrites.
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()>;

    /// Flush everything. Returns the archive path for archive sinks.
    fn finish(&mut self) -> Result<Option<PathBuf>>;
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

// -- Directory ------------------------------------------------------------------

/// Writes files straight into a folder, creating nested pair folders.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Open (creating if needed) `root` and check it can be written.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|err| revoked_or_io(&root, err))?;
        let sink = Self { root };
        sink.check_access()?;
        info!("export folder ready");
        Ok(sink)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_access(&self) -> Result<()> {
        let meta = std::fs::metadata(&self.root).map_err(|err| revoked_or_io(&self.root, err))?;
        if !meta.is_dir() || meta.permissions().readonly() {
            return Err(CardwerkError::PermissionRevoked(
                self.root.display().to_string(),
            ));
        }
        Ok(())
    }
}

fn revoked_or_io(path: &Path, err: std::io::Error) -> CardwerkError {
    match err.kind() {
        ErrorKind::PermissionDenied | ErrorKind::NotFound => {
            CardwerkError::PermissionRevoked(path.display().to_string())
        }
        _ => CardwerkError::Io(err),
    }
}

impl ExportSink for DirectorySink {
    fn describe(&self) -> String {
        format!("folder {}", self.root.display())
    }

    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        self.check_access()?;
        let target = join_relative(&self.root, relative_path);
        if target.exists() {
            return Err(CardwerkError::NameCollision(relative_path.to_string()));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|err| revoked_or_io(&self.root, err))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => CardwerkError::NameCollision(relative_path.to_string()),
                _ => revoked_or_io(&self.root, err),
            })?;
        file.write_all(bytes)?;
        debug!(path = relative_path, bytes = bytes.len(), "file written");
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

// -- Archive --------------------------------------------------------------------

/// Accumulates files into an in-memory ZIP and writes it out on `finish`.
pub struct ArchiveSink {
    target: PathBuf,
    writer: Option<ZipWriter<Cursor<Vec<u8>>>>,
    entries: HashSet<String>,
}

impl ArchiveSink {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            writer: Some(ZipWriter::new(Cursor::new(Vec::new()))),
            entries: HashSet::new(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<Cursor<Vec<u8>>>> {
        self.writer
            .as_mut()
            .ok_or_else(|| CardwerkError::Archive("archive already finished".into()))
    }
}

impl std::fmt::Debug for ArchiveSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSink")
            .field("target", &self.target)
            .field("entries", &self.entries.len())
            .field("finished", &self.writer.is_none())
            .finish()
    }
}

impl ExportSink for ArchiveSink {
    fn describe(&self) -> String {
        format!("archive {}", self.target.display())
    }

    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        if self.entries.contains(relative_path) {
            return Err(CardwerkError::NameCollision(relative_path.to_string()));
        }
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let writer = self.writer()?;
        writer
            .start_file(relative_path, options)
            .map_err(|err| CardwerkError::Archive(format!("{relative_path}: {err}")))?;
        writer
            .write_all(bytes)
            .map_err(|err| CardwerkError::Archive(format!("{relative_path}: {err}")))?;
        self.entries.insert(relative_path.to_string());
        debug!(path = relative_path, bytes = bytes.len(), "archive entry added");
        Ok(())
    }

    #[instrument(skip(self), fields(target = %self.target.display(), entries = self.entries.len()))]
    fn finish(&mut self) -> Result<Option<PathBuf>> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| CardwerkError::Archive("archive already finished".into()))?;
        let cursor = writer
            .finish()
            .map_err(|err| CardwerkError::Archive(err.to_string()))?;
        let bytes = cursor.into_inner();
        if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.target, &bytes)?;
        info!(bytes = bytes.len(), "archive written");
        Ok(Some(self.target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn directory_sink_creates_nested_folders() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::open(dir.path()).unwrap();
        sink.write("Base/Pikachu/FRONT_LISTING.jpg", b"abc").unwrap();
        let written = std::fs::read(dir.path().join("Base").join("Pikachu").join("FRONT_LISTING.jpg")).unwrap();
        assert_eq!(written, b"abc");
        assert_eq!(sink.finish().unwrap(), None);
    }

    #[test]
    fn directory_sink_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::open(dir.path()).unwrap();
        sink.write("Card/FRONT_LISTING.jpg", b"first").unwrap();
        match sink.write("Card/FRONT_LISTING.jpg", b"second") {
            Err(CardwerkError::NameCollision(path)) => assert_eq!(path, "Card/FRONT_LISTING.jpg"),
            other => panic!("expected NameCollision, got {other:?}"),
        }
        let kept = std::fs::read(dir.path().join("Card").join("FRONT_LISTING.jpg")).unwrap();
        assert_eq!(kept, b"first");
    }

    #[test]
    fn removed_folder_is_reported_as_revoked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("exports");
        let mut sink = DirectorySink::open(&root).unwrap();
        std::fs::remove_dir_all(&root).unwrap();
        assert!(matches!(
            sink.write("Card/FRONT_LISTING.jpg", b"x"),
            Err(CardwerkError::PermissionRevoked(_))
        ));
    }

    #[test]
    fn archive_sink_writes_stored_entries() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("export.zip");
        let mut sink = ArchiveSink::new(&target);
        sink.write("Base/Pikachu/FRONT_LISTING.jpg", b"abc").unwrap();
        sink.write("Base/Pikachu/MANIFEST.json", b"{}").unwrap();
        assert_eq!(sink.finish().unwrap(), Some(target.clone()));

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&target).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("Base/Pikachu/FRONT_LISTING.jpg").unwrap();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"abc");
    }

    #[test]
    fn archive_sink_rejects_duplicate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ArchiveSink::new(dir.path().join("export.zip"));
        sink.write("Card/FRONT_LISTING.jpg", b"a").unwrap();
        assert!(matches!(
            sink.write("Card/FRONT_LISTING.jpg", b"b"),
            Err(CardwerkError::NameCollision(_))
        ));
    }
}
