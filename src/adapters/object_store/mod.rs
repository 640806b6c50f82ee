//! Object storage adapters.
//!
//! `HttpObjectStore` fronts an HTTP blob service (checksums and sizes come
//! from response headers); `LocalObjectStore` serves a directory for
//! single-node setups. Both bound their probes with a timeout so a dead
//! store surfaces as unhealthy rather than a hang.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{ObjectMeta, ObjectStore};

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP-backed blob store.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::ObjectStorage(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn stat(&self, key: &str) -> DomainResult<Option<ObjectMeta>> {
        let response = self
            .client
            .head(self.object_url(key))
            .send()
            .await
            .map_err(|e| DomainError::ObjectStorage(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DomainError::ObjectStorage(format!(
                "stat {} returned {}",
                key,
                response.status()
            )));
        }

        let checksum = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();

        Ok(Some(ObjectMeta {
            checksum,
            file_name,
            size,
        }))
    }

    fn download_url(&self, key: &str) -> String {
        self.object_url(key)
    }

    async fn probe(&self) -> DomainResult<()> {
        let response = self
            .client
            .head(&self.base_url)
            .send()
            .await
            .map_err(|e| DomainError::ObjectStorage(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(DomainError::ObjectStorage(format!(
                "probe returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Directory-backed blob store for single-node deployments.
pub struct LocalObjectStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        // Keys are flat names; path components are rejected so a key can
        // never escape the base directory.
        self.base_dir.join(Path::new(key).file_name().unwrap_or_default())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn stat(&self, key: &str) -> DomainResult<Option<ObjectMeta>> {
        let path = self.object_path(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                checksum: None,
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| key.to_string()),
                size: Some(meta.len()),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::ObjectStorage(e.to_string())),
        }
    }

    fn download_url(&self, key: &str) -> String {
        format!("{}/objects/{}", self.base_url, key.trim_start_matches('/'))
    }

    async fn probe(&self) -> DomainResult<()> {
        match tokio::fs::metadata(&self.base_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(DomainError::ObjectStorage(format!(
                "{} is not a directory",
                self.base_dir.display()
            ))),
            Err(e) => Err(DomainError::ObjectStorage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_stat_reads_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/wordlists/rockyou.txt")
            .with_status(200)
            .with_header("etag", "\"abc123\"")
            .with_header("content-length", "14344384")
            .create_async()
            .await;

        let store = HttpObjectStore::new(server.url(), DEFAULT_PROBE_TIMEOUT).unwrap();
        let meta = store.stat("wordlists/rockyou.txt").await.unwrap().unwrap();

        assert_eq!(meta.checksum.as_deref(), Some("abc123"));
        assert_eq!(meta.size, Some(14_344_384));
        assert_eq!(meta.file_name, "rockyou.txt");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_stat_missing_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/missing.txt")
            .with_status(404)
            .create_async()
            .await;

        let store = HttpObjectStore::new(server.url(), DEFAULT_PROBE_TIMEOUT).unwrap();
        assert!(store.stat("missing.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_probe_server_error_is_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/")
            .with_status(503)
            .create_async()
            .await;

        let store = HttpObjectStore::new(server.url(), DEFAULT_PROBE_TIMEOUT).unwrap();
        assert!(store.probe().await.is_err());
    }

    #[tokio::test]
    async fn test_local_stat_and_probe() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("words.txt"), b"password\n")
            .await
            .unwrap();

        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080");
        let meta = store.stat("words.txt").await.unwrap().unwrap();
        assert_eq!(meta.file_name, "words.txt");
        assert_eq!(meta.size, Some(9));

        assert!(store.stat("absent.txt").await.unwrap().is_none());
        assert!(store.probe().await.is_ok());
        assert_eq!(
            store.download_url("words.txt"),
            "http://localhost:8080/objects/words.txt"
        );
    }
}
