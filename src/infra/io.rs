//! Smart file loading (mmap above a size threshold) and atomic writes.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Either a memory-mapped file or a buffered read, picked by size.
pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => mmap,
            FileContent::Buffered(buf) => buf,
        }
    }
}

/// Read a file, memory-mapping it when it is large enough that copying the
/// whole thing into a `Vec` would be wasteful (bundles routinely exceed 10 MB).
pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

        // Safety: the file is opened read-only and not expected to be mutated
        // concurrently by another process for the lifetime of one command.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to mmap {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Write `content` to `path` via a temp file in the same directory followed by
/// a rename, so a crash mid-write never leaves a truncated or partial file.
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to rename temp file into {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn read_file_smart_buffered_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.js");
        std::fs::write(&path, b"a=1;").unwrap();
        let content = read_file_smart(&path).unwrap();
        assert_eq!(content.as_bytes(), b"a=1;");
    }
}
