//! Asset loader - resolves logical sound names to byte streams
//!
//! The playback core never touches the filesystem itself. It asks an
//! [`AssetSource`] for a reader and hands whatever comes back to the decoder.
//!
//! # Example
//! ```ignore
//! let assets = FileAssets::new("Content", "wav");
//! let reader = assets.open("sfx/explosion")?; // opens Content/sfx/explosion.wav
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Asset-resolution collaborator
pub trait AssetSource: Send + Sync {
    /// Open the byte stream for a logical name (e.g. `"sfx/explosion"`)
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Loads assets from `<content_dir>/<name>.<extension>`
#[derive(Debug, Clone)]
pub struct FileAssets {
    content_dir: PathBuf,
    extension: String,
}

impl FileAssets {
    pub fn new<P: AsRef<Path>>(content_dir: P, extension: &str) -> Self {
        Self {
            content_dir: content_dir.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Map a logical name to its file path.
    ///
    /// Names containing `..` segments or absolute paths are rejected.
    pub fn resolve_path(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        if name.split('/').any(|segment| segment == "..") || relative.is_absolute() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid asset name: {}", name),
            ));
        }

        let mut path = self.content_dir.join(relative);
        if !self.extension.is_empty() {
            let file_name = match path.file_name() {
                Some(file_name) => format!("{}.{}", file_name.to_string_lossy(), self.extension),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("invalid asset name: {}", name),
                    ))
                }
            };
            path.set_file_name(file_name);
        }
        Ok(path)
    }
}

impl AssetSource for FileAssets {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let path = self.resolve_path(name)?;
        log::debug!("opening asset {} from {}", name, path.display());
        let file = File::open(&path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// In-memory assets, keyed by full logical name
#[derive(Debug, Default)]
pub struct MemoryAssets {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset
    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.entries.write().insert(name.to_string(), bytes);
    }

    pub fn with(self, name: &str, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        match self.entries.read().get(name) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("asset not found: {}", name),
            )),
        }
    }
}
