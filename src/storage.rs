use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio_retry::{strategy::FixedInterval, Retry};

use crate::{
    types::{FileInfo, FolderInfo, WriteLocation},
    utils::{jitter, REPORTS_DIR},
};

pub const BLOB_API_URL: &str = "https://blob.vercel-storage.com";
const BLOB_API_VERSION: &str = "7";
const BLOB_LIST_LIMIT: u32 = 1000;

/// Backend selection, decided once at process start and injected. Nothing
/// outside this module branches on which variant is active.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local { root: PathBuf },
    Blob { api_url: String, token: String },
}

pub fn from_config(config: StorageConfig) -> Arc<dyn Storage> {
    match config {
        StorageConfig::Local { root } => Arc::new(LocalStorage::new(root)),
        StorageConfig::Blob { api_url, token } => Arc::new(BlobStorage::new(api_url, token)),
    }
}

/// Uniform artifact persistence. Both implementations must produce identical
/// shapes for all four operations: a second write to the same path
/// overwrites, listing a missing prefix or folder yields an empty vec, and
/// deleting an absent folder is a success.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn write_file(&self, path: &str, content: &[u8]) -> anyhow::Result<WriteLocation>;

    /// Top-level folders under `prefix`, most recently created first.
    async fn list_folders(&self, prefix: &str) -> anyhow::Result<Vec<FolderInfo>>;

    /// Artifacts within one report folder.
    async fn list_files(&self, folder: &str) -> anyhow::Result<Vec<FileInfo>>;

    async fn delete_folder(&self, folder: &str) -> anyhow::Result<()>;
}

/// Filesystem-backed storage rooted at one directory (the process working
/// directory in production, a scratch dir in tests).
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        LocalStorage { root }
    }

    fn folder_dir(&self, folder: &str) -> PathBuf {
        self.root.join(REPORTS_DIR).join(folder)
    }
}

fn created_time(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    let ts = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    DateTime::<Utc>::from(ts)
}

#[async_trait]
impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, content: &[u8]) -> anyhow::Result<WriteLocation> {
        let full_path = self.root.join(path);
        if let Some(dir) = full_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .context(format!("could not create report dir {:?}", dir))?;
        }
        tokio::fs::write(&full_path, content)
            .await
            .context(format!("could not write artifact at {:?}", full_path))?;

        Ok(WriteLocation {
            url: format!("/api/files?file={}", path),
        })
    }

    async fn list_folders(&self, prefix: &str) -> anyhow::Result<Vec<FolderInfo>> {
        let dir = self.root.join(prefix.trim_end_matches('/'));
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut folders = vec![];
        for entry in std::fs::read_dir(&dir).context(format!("could not read dir {:?}", dir))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let mut file_count = 0;
            let mut size = 0;
            for file in std::fs::read_dir(entry.path())? {
                let file = file?;
                file_count += 1;
                size += file.metadata()?.len();
            }

            folders.push(FolderInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                created: created_time(&entry.metadata()?),
                file_count,
                size,
            });
        }
        folders.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(folders)
    }

    async fn list_files(&self, folder: &str) -> anyhow::Result<Vec<FileInfo>> {
        let dir = self.folder_dir(folder);
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut files = vec![];
        for entry in std::fs::read_dir(&dir).context(format!("could not read dir {:?}", dir))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata()?;
            files.push(FileInfo {
                url: format!("/api/files?file={}/{}/{}", REPORTS_DIR, folder, name),
                download_url: format!(
                    "/api/files?file={}/{}/{}&download=true",
                    REPORTS_DIR, folder, name
                ),
                name,
                size: metadata.len(),
                created: created_time(&metadata),
            });
        }
        Ok(files)
    }

    async fn delete_folder(&self, folder: &str) -> anyhow::Result<()> {
        let dir = self.folder_dir(folder);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .context(format!("could not delete folder {:?}", dir))?;
        }
        Ok(())
    }
}

/// Remote blob-store backend speaking the Vercel Blob HTTP API. Folder
/// metadata is computed by listing object keys and grouping on the second
/// path segment, matching what the local variant derives from the
/// filesystem.
pub struct BlobStorage {
    api_url: String,
    token: String,
    client: Arc<Client>,
}

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobMeta {
    pathname: String,
    size: u64,
    uploaded_at: DateTime<Utc>,
    url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
struct ListBlobsResponse {
    blobs: Vec<BlobMeta>,
}

impl BlobStorage {
    pub fn new(api_url: String, token: String) -> Self {
        BlobStorage {
            api_url,
            token,
            client: Arc::new(Client::new()),
        }
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobMeta>> {
        let res = self
            .client
            .get(format!(
                "{}?prefix={}&limit={}",
                self.api_url,
                urlencoding::encode(prefix),
                BLOB_LIST_LIMIT
            ))
            .bearer_auth(&self.token)
            .header("x-api-version", BLOB_API_VERSION)
            .send()
            .await
            .context("blob list request failed")?
            .error_for_status()?;

        let res = res.json::<ListBlobsResponse>().await?;
        Ok(res.blobs)
    }

    async fn delete_blob(&self, url: &str) -> anyhow::Result<()> {
        self.client
            .post(format!("{}/delete", self.api_url))
            .bearer_auth(&self.token)
            .header("x-api-version", BLOB_API_VERSION)
            .json(&serde_json::json!({ "urls": [url] }))
            .send()
            .await
            .context(format!("could not delete blob {}", url))?
            .error_for_status()?;
        Ok(())
    }
}

/// Groups a flat blob listing (`reports/{folder}/{file}`) into per-folder
/// aggregates. `created` is the first listed blob's upload time.
fn group_into_folders(blobs: Vec<BlobMeta>) -> Vec<FolderInfo> {
    let mut folders: HashMap<String, FolderInfo> = HashMap::new();
    for blob in blobs {
        let parts = blob.pathname.split('/').collect::<Vec<&str>>();
        if parts.len() < 3 {
            continue;
        }
        let folder = folders
            .entry(parts[1].to_string())
            .or_insert_with(|| FolderInfo {
                name: parts[1].to_string(),
                created: blob.uploaded_at,
                file_count: 0,
                size: 0,
            });
        folder.file_count += 1;
        folder.size += blob.size;
    }
    let mut folders = folders.into_values().collect::<Vec<FolderInfo>>();
    folders.sort_by(|a, b| b.created.cmp(&a.created));
    folders
}

#[async_trait]
impl Storage for BlobStorage {
    async fn write_file(&self, path: &str, content: &[u8]) -> anyhow::Result<WriteLocation> {
        let retry_strategy = FixedInterval::from_millis(250).map(jitter).take(3);

        let client = self.client.clone();
        let url = format!("{}/{}", self.api_url, path);
        let token = self.token.clone();
        let body = content.to_vec();

        let res = Retry::spawn(retry_strategy, move || {
            client
                .put(&url)
                .bearer_auth(&token)
                .header("x-api-version", BLOB_API_VERSION)
                .header("Content-Type", "application/octet-stream")
                .timeout(Duration::from_secs(30))
                .body(body.clone())
                .send()
        })
        .await
        .context(format!("could not upload blob at {}", path))?;

        let status = res.status();
        if status.as_u16() >= 300 {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("blob upload for {} failed: {} {}", path, status, body));
        }

        let res = res.json::<PutBlobResponse>().await?;
        Ok(WriteLocation { url: res.url })
    }

    async fn list_folders(&self, prefix: &str) -> anyhow::Result<Vec<FolderInfo>> {
        let blobs = self.list(prefix).await?;
        Ok(group_into_folders(blobs))
    }

    async fn list_files(&self, folder: &str) -> anyhow::Result<Vec<FileInfo>> {
        let blobs = self
            .list(&format!("{}/{}/", REPORTS_DIR, folder))
            .await?;

        let files = blobs
            .into_iter()
            .map(|blob| FileInfo {
                name: blob
                    .pathname
                    .rsplit('/')
                    .next()
                    .unwrap_or(blob.pathname.as_str())
                    .to_string(),
                size: blob.size,
                created: blob.uploaded_at,
                url: blob.url,
                download_url: blob.download_url,
            })
            .collect();
        Ok(files)
    }

    async fn delete_folder(&self, folder: &str) -> anyhow::Result<()> {
        let blobs = self
            .list(&format!("{}/{}/", REPORTS_DIR, folder))
            .await?;

        for blob in blobs {
            self.delete_blob(&blob.url).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::create_random_tmp_folder;
    use chrono::TimeZone;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    fn scratch_storage() -> (LocalStorage, PathBuf) {
        let root = create_random_tmp_folder().unwrap();
        (LocalStorage::new(root.clone()), root)
    }

    #[test]
    fn second_write_to_the_same_path_wins() {
        let (storage, root) = scratch_storage();
        let path = "reports/ex-2026-08-07/home-mobile-t.html";

        let loc = aw!(storage.write_file(path, b"first")).unwrap();
        assert_eq!(loc.url, format!("/api/files?file={}", path));

        aw!(storage.write_file(path, b"second")).unwrap();
        let content = std::fs::read(root.join(path)).unwrap();
        assert_eq!(content, b"second");

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_prefix_lists_no_folders() {
        let (storage, root) = scratch_storage();
        let folders = aw!(storage.list_folders("reports/")).unwrap();
        assert!(folders.is_empty());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn folder_listing_aggregates_counts_and_sizes() {
        let (storage, root) = scratch_storage();
        aw!(storage.write_file("reports/ex-2026-08-07/a.html", b"aaaa")).unwrap();
        aw!(storage.write_file("reports/ex-2026-08-07/b.html", b"bb")).unwrap();
        aw!(storage.write_file("reports/other-2026-08-07/c.html", b"c")).unwrap();

        let folders = aw!(storage.list_folders("reports/")).unwrap();
        assert_eq!(folders.len(), 2);
        let ex = folders.iter().find(|f| f.name == "ex-2026-08-07").unwrap();
        assert_eq!(ex.file_count, 2);
        assert_eq!(ex.size, 6);

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_folder_lists_no_files() {
        let (storage, root) = scratch_storage();
        let files = aw!(storage.list_files("nope-2026-01-01")).unwrap();
        assert!(files.is_empty());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn file_listing_carries_locations() {
        let (storage, root) = scratch_storage();
        aw!(storage.write_file("reports/ex-2026-08-07/home-mobile-t.html", b"<html>")).unwrap();

        let files = aw!(storage.list_files("ex-2026-08-07")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "home-mobile-t.html");
        assert_eq!(files[0].size, 6);
        assert_eq!(
            files[0].url,
            "/api/files?file=reports/ex-2026-08-07/home-mobile-t.html"
        );
        assert!(files[0].download_url.ends_with("&download=true"));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn deleting_an_absent_folder_is_a_success() {
        let (storage, root) = scratch_storage();
        assert!(aw!(storage.delete_folder("never-existed")).is_ok());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn delete_removes_every_artifact() {
        let (storage, root) = scratch_storage();
        aw!(storage.write_file("reports/ex-2026-08-07/a.html", b"a")).unwrap();
        aw!(storage.delete_folder("ex-2026-08-07")).unwrap();
        assert!(!root.join("reports/ex-2026-08-07").exists());
        std::fs::remove_dir_all(root).unwrap();
    }

    fn blob(pathname: &str, size: u64, hour: u32) -> BlobMeta {
        BlobMeta {
            pathname: pathname.into(),
            size,
            uploaded_at: Utc.with_ymd_and_hms(2026, 8, 7, hour, 0, 0).unwrap(),
            url: format!("https://blob.example/{}", pathname),
            download_url: format!("https://blob.example/{}?download=1", pathname),
        }
    }

    #[test]
    fn blob_keys_group_like_directories() {
        let folders = group_into_folders(vec![
            blob("reports/ex-2026-08-07/a.html", 4, 1),
            blob("reports/ex-2026-08-07/b.html", 2, 2),
            blob("reports/late-2026-08-07/c.html", 1, 5),
            // top-level key without a folder segment is ignored
            blob("reports/stray.html", 9, 3),
        ]);

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "late-2026-08-07");
        let ex = &folders[1];
        assert_eq!(ex.name, "ex-2026-08-07");
        assert_eq!(ex.file_count, 2);
        assert_eq!(ex.size, 6);
        // created sticks to the first listed blob
        assert_eq!(ex.created, Utc.with_ymd_and_hms(2026, 8, 7, 1, 0, 0).unwrap());
    }

    #[test]
    fn empty_blob_listing_means_no_folders() {
        assert!(group_into_folders(vec![]).is_empty());
    }
}
