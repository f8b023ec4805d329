// storage/mod.rs
//! The storage directory
//!
//! Uploaded videos live directly in a single directory. There is no index; the directory listing
//! is the source of truth.

use std::{
    error::Error as StdError,
    io,
    path::{
        Path,
        PathBuf,
    },
    pin::pin,
    time::{
        SystemTime,
        UNIX_EPOCH,
    },
};

use axum::body::Bytes;
use futures::{
    Stream,
    StreamExt,
};
use thiserror::Error;
use tokio::{
    fs::{
        self,
        File,
    },
    io::AsyncWriteExt,
};
use tracing::{
    debug,
    info,
    warn,
};

use crate::utils::file::base_name;

/// Prefix of in-flight uploads. These never match the gallery's extension filter.
const PARTIAL_PREFIX: &str = ".upload-";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create storage directory {0:?}: {1}")]
    CreateDir(PathBuf, #[source] io::Error),

    #[error("Failed to list storage directory {0:?}: {1}")]
    List(PathBuf, #[source] io::Error),

    #[error("Failed to write {0:?}: {1}")]
    Write(PathBuf, #[source] io::Error),

    #[error("Failed to read upload body: {0}")]
    Body(#[source] Box<dyn StdError + Send + Sync>),
}

/// A video that has been written to the storage directory
#[derive(Debug, Clone)]
pub struct StoredVideo {
    /// Generated name, `<millis>-<original>`
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// # Open the storage directory, creating it if it's missing
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::CreateDir(dir.clone(), e))?;

        debug!("Opened storage directory {dir:?}");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// # Generate the stored name for an upload
    ///
    /// Names are unique as long as two uploads with the same original name don't land in the same
    /// millisecond. If they do, the later one replaces the earlier one.
    pub fn stored_name(original: &str, at: SystemTime) -> String {
        let millis = at.duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default();
        format!("{millis}-{}", base_name(original))
    }

    /// # Write an upload to the storage directory
    ///
    /// The body is streamed into a hidden temp file in the storage directory, which only gets its
    /// final name once the whole body is on disk. If the body errors, a write fails, or the future
    /// is dropped partway through, the temp file is removed, so either the whole upload is stored
    /// or nothing is.
    pub async fn store<S, E>(&self, original: &str, body: S) -> Result<StoredVideo, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let mut body = pin!(body);

        let (file, temp_path) = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| StorageError::Write(self.dir.clone(), e))?
            .into_parts();
        let mut file = File::from_std(file);
        let write_err = |e| StorageError::Write(temp_path.to_path_buf(), e);

        let mut size = 0u64;
        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| StorageError::Body(Box::new(e)))?;
            file.write_all(&bytes).await.map_err(write_err)?;
            size += bytes.len() as u64;
        }
        file.flush().await.map_err(write_err)?;
        drop(file);

        let name = Self::stored_name(original, SystemTime::now());
        let path = self.dir.join(&name);
        temp_path
            .persist(&path)
            .map_err(|e| StorageError::Write(path.clone(), e.error))?;

        info!("Stored {name} at {path:?} ({size} bytes)");
        Ok(StoredVideo { name, path, size })
    }

    /// # List stored files whose name ends with `extension`
    ///
    /// Order is whatever the directory listing yields. Non-UTF-8 names and anything that isn't a
    /// regular file are skipped.
    pub async fn list(&self, extension: &str) -> Result<Vec<String>, StorageError> {
        let list_err = |e| StorageError::List(self.dir.clone(), e);
        let mut entries = fs::read_dir(&self.dir).await.map_err(list_err)?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                warn!("Skipping non-UTF-8 entry in {:?}", self.dir);
                continue;
            };

            if !name.ends_with(extension) {
                continue;
            }

            match entry.file_type().await {
                | Ok(ft) if ft.is_file() => names.push(name),
                | Ok(_) => {},
                | Err(e) => warn!("Failed to stat {name}: {e}"),
            }
        }

        Ok(names)
    }
}
