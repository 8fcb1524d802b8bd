use axum::body::Body as AxumBody;
use futures_util::stream::StreamExt;
use http_body_util::BodyExt;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, ErrorKind};

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Maps a key to a file directly under the root.
    ///
    /// The key must be a single normal path component, and the resolved
    /// entry must not be a symlink, so the result never escapes the root.
    pub async fn resolve_key(&self, key: &str) -> Result<PathBuf, StorageError> {
        let target = self.join_key(key)?;
        self.ensure_no_symlink_components(&target).await?;
        Ok(target)
    }

    fn join_key(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) {
            return Err(StorageError::InvalidPath);
        }
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) => Ok(self.root.join(segment)),
            _ => Err(StorageError::InvalidPath),
        }
    }

    async fn ensure_no_symlink_components(&self, target: &Path) -> Result<(), StorageError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath)?;
        let mut current = PathBuf::from(&self.root);

        for component in relative.components() {
            current.push(component.as_os_str());
            match fs::symlink_metadata(&current).await {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    return Err(StorageError::InvalidPath);
                }
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(())
    }

    pub async fn is_dir(&self, target: &Path) -> bool {
        fs::metadata(target)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    /// Truncates `target` and streams `body` into it, returning the byte count.
    ///
    /// `limit` of zero disables the size check. Nothing is cleaned up on
    /// failure, so an interrupted upload leaves a truncated file behind.
    pub async fn write_stream(
        &self,
        target: &Path,
        body: AxumBody,
        limit: u64,
    ) -> Result<u64, StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(target)
            .await?;

        let copy_result: Result<u64, StorageError> = async {
            let mut data_stream = BodyExt::into_data_stream(body);
            let mut total_written: u64 = 0;
            while let Some(chunk) = data_stream.next().await {
                let chunk = chunk.map_err(io::Error::other)?;
                if chunk.is_empty() {
                    continue;
                }
                total_written += chunk.len() as u64;
                if limit > 0 && total_written > limit {
                    return Err(StorageError::LimitExceeded(limit));
                }
                file.write_all(&chunk).await?;
            }
            Ok(total_written)
        }
        .await;

        // Settle pending writes before reporting either outcome.
        let flushed = file.flush().await;
        let total_written = copy_result?;
        flushed?;
        Ok(total_written)
    }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    LimitExceeded(u64),
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::InvalidPath => f.write_str("invalid path"),
            StorageError::LimitExceeded(limit) => write!(f, "upload exceeds {limit} bytes"),
            StorageError::Io(err) => err.fmt(f),
        }
    }
}
