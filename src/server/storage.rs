//! Where received files go
// (c) 2024 Ross Younger

use std::{io, path::PathBuf};

use async_trait::async_trait;
use tokio::{fs::File, io::AsyncWriteExt as _};
use tracing::trace;

/// An open destination for one incoming file.
///
/// Exactly one session owns each sink. It is opened on WRQ and finished on FIN,
/// eviction, abandonment or shutdown.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// Appends bytes to the end of the file
    async fn append(&mut self, data: &[u8]) -> io::Result<()>;
    /// Flushes and closes the file. Further appends are not permitted.
    async fn finish(&mut self) -> io::Result<()>;
}

/// Creates [`ByteSink`]s by name
#[async_trait]
pub trait Storage: Send + Sync {
    /// Creates (or truncates) the named file
    async fn create(&self, name: &str) -> io::Result<Box<dyn ByteSink>>;
}

/// Stores files in a directory on the local filesystem.
///
/// Names are joined onto the directory exactly as received.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Constructor
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Storage for DirectoryStorage {
    async fn create(&self, name: &str) -> io::Result<Box<dyn ByteSink>> {
        let path = self.root.join(name);
        trace!("creating {path:?}");
        let file = File::create(&path).await?;
        Ok(Box::new(FileSink { file }))
    }
}

#[derive(Debug)]
struct FileSink {
    file: File,
}

#[async_trait]
impl ByteSink for FileSink {
    async fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }
}
