use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;
use tempfile::NamedTempFile;

use super::Snapshot;
use crate::diagnostics::{Result, ScopesnapError};

/// What a snapshot write did to the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Updated,
    Unchanged,
}

impl WriteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStatus::Created => "created",
            WriteStatus::Updated => "updated",
            WriteStatus::Unchanged => "unchanged",
        }
    }
}

/// Snapshot files live under one root, mirroring the fixture tree:
/// `fixtures/go/hello.go` is recorded at `<root>/go/hello.go.snap`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, fixture: &Path) -> PathBuf {
        let mut name = fixture.as_os_str().to_owned();
        name.push(".snap");
        self.root.join(name)
    }

    /// Loads the snapshot for `fixture`, or `None` when none is recorded.
    pub fn load(&self, fixture: &Path) -> Result<Option<Snapshot>> {
        let path = self.path_for(fixture);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ScopesnapError::io(path, e)),
        };
        Snapshot::parse(&text)
            .map(Some)
            .map_err(|e| ScopesnapError::CorruptSnapshot {
                path,
                line: e.line,
                message: e.message,
            })
    }

    /// Writes the snapshot for `fixture` atomically: the bytes go to a
    /// temporary file in the destination directory which is then renamed
    /// over the old snapshot. Identical content is left untouched.
    pub fn write(&self, fixture: &Path, snapshot: &Snapshot) -> Result<WriteStatus> {
        let path = self.path_for(fixture);
        let content = snapshot.serialize();

        let status = match fs::read(&path) {
            Ok(existing) if existing == content.as_bytes() => return Ok(WriteStatus::Unchanged),
            Ok(_) => WriteStatus::Updated,
            Err(e) if e.kind() == io::ErrorKind::NotFound => WriteStatus::Created,
            Err(e) => return Err(ScopesnapError::io(path, e)),
        };

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| ScopesnapError::io(dir, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| ScopesnapError::io(dir, e))?;
        temp.write_all(content.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| ScopesnapError::io(temp.path(), e))?;
        temp.persist(&path)
            .map_err(|e| ScopesnapError::io(&path, e.error))?;

        debug!("{} snapshot {}", status.as_str(), path.display());
        Ok(status)
    }
}
