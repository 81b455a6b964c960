use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write lines to `path`, each terminated by `\n`.
    ///
    /// The content goes to a temporary file in the same directory which is then
    /// renamed over `path`, so a reader sees either the old or the new file.
    pub fn write_lines_atomic<P, S>(path: P, lines: &[S]) -> io::Result<()>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let path = path.as_ref();
        let mut file = NamedTempFile::new_in(Self::parent_dir(path))?;
        {
            let mut writer = io::BufWriter::new(file.as_file_mut());
            for line in lines {
                writer.write_all(line.as_ref().as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Replace `to` with a copy of `from`, atomically from the point of view of readers of `to`
    pub fn replace_with_copy<P1: AsRef<Path>, P2: AsRef<Path>>(from: P1, to: P2) -> io::Result<()> {
        let to = to.as_ref();
        let content = fs::read(from.as_ref())?;

        let mut file = NamedTempFile::new_in(Self::parent_dir(to))?;
        file.write_all(&content)?;
        file.as_file().sync_all()?;
        file.persist(to).map_err(|e| e.error)?;
        Ok(())
    }

    /// Directory a temporary sibling of `path` should live in
    fn parent_dir(path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}
