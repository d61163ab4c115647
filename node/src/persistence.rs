// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Checksum state persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use custody_kernel::checksum::ChecksumState;
use tokio::sync::RwLock;

use crate::errors::CustodyResult;

#[async_trait]
pub trait ChecksumStore: Send + Sync {
    /// `None` when nothing has been persisted yet.
    async fn load(&self) -> CustodyResult<Option<ChecksumState>>;

    async fn save(&self, state: &ChecksumState) -> CustodyResult<()>;
}

/// Checksum state in a small local file.
///
/// Writes go to `<path>.tmp` and are renamed over the live file, so a
/// reader always finds either the old or the new state. A copy of the
/// previous version is kept as `<path>.prev`.
pub struct FileChecksumStore {
    path: PathBuf,
}

impl FileChecksumStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl ChecksumStore for FileChecksumStore {
    async fn load(&self) -> CustodyResult<Option<ChecksumState>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(ChecksumState::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &ChecksumState) -> CustodyResult<()> {
        let tmp_path = self.sibling(".tmp");
        let bytes = state.encode();

        {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
        }

        // The live file stays in place until the rename replaces it.
        if tokio::fs::metadata(&self.path).await.is_ok() {
            if let Err(e) = tokio::fs::copy(&self.path, self.sibling(".prev")).await {
                tracing::warn!("Could not keep previous checksum state: {}", e);
            }
        }
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// Process-local store, for embedding and tests.
#[derive(Default)]
pub struct MemoryChecksumStore {
    state: RwLock<Option<ChecksumState>>,
}

impl MemoryChecksumStore {
    pub fn new(initial: Option<ChecksumState>) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl ChecksumStore for MemoryChecksumStore {
    async fn load(&self) -> CustodyResult<Option<ChecksumState>> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &ChecksumState) -> CustodyResult<()> {
        *self.state.write().await = Some(state.clone());
        Ok(())
    }
}
