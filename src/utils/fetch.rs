//! Resolving tool inputs that may be local paths or remote urls.
//!
//! Remote files are downloaded once into the scratch directory under a name
//! derived from the SHA-256 of the url, keeping the original extension so
//! later format dispatch still works.

use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::toolkits::ToolError;

/// True for http(s) urls.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Lowercase extension of a path or url.
///
/// For urls only the last segment of the path counts, so a bare host or a
/// trailing slash has no extension. Extensions that are not purely
/// alphanumeric (`J._R._R._Tolkien`) are ignored.
pub fn extension_of(source: &str) -> Option<String> {
    let file_name = if is_url(source) {
        let url = Url::parse(source).ok()?;
        url.path_segments()?.next_back()?.to_string()
    } else {
        Path::new(source).file_name()?.to_string_lossy().into_owned()
    };

    Path::new(&file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Cache file name for a url.
pub fn cache_file_name(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    match extension_of(url) {
        Some(ext) => format!("{}.{}", &digest[..16], ext),
        None => digest[..16].to_string(),
    }
}

/// Returns a local path for `source`, downloading it into `cache_dir` if it is a url.
pub async fn resolve_local(
    client: &Client,
    source: &str,
    cache_dir: &Path,
) -> Result<PathBuf, ToolError> {
    if !is_url(source) {
        let path = PathBuf::from(source);
        if !path.exists() {
            return Err(ToolError::FilesystemError(format!(
                "File not found: {}",
                source
            )));
        }
        return Ok(path);
    }

    let target = cache_dir.join(cache_file_name(source));
    if target.exists() {
        debug!(url = source, path = %target.display(), "Using cached download");
        return Ok(target);
    }

    let bytes = fetch_bytes(client, source).await?;
    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(|e| ToolError::FilesystemError(e.to_string()))?;
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(|e| ToolError::FilesystemError(e.to_string()))?;
    debug!(url = source, bytes = bytes.len(), "Downloaded remote file");
    Ok(target)
}

/// Downloads `url` and returns the body.
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, ToolError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("Request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ToolError::ExecutionFailed(format!(
            "Request to {} returned HTTP {}",
            url,
            status.as_u16()
        )));
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read body of {}: {}", url, e)))
}

/// Downloads `url` and returns the body as text.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, ToolError> {
    let bytes = fetch_bytes(client, url).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.pdf"));
        assert!(is_url("http://localhost/x"));
        assert!(!is_url("/data/gaia/file.xlsx"));
        assert!(!is_url("file.txt"));
    }

    #[test]
    fn test_extension_of_strips_query() {
        assert_eq!(extension_of("https://x.org/a/Report.PDF?dl=1").as_deref(), Some("pdf"));
        assert_eq!(extension_of("sheet.xlsx").as_deref(), Some("xlsx"));
        assert_eq!(extension_of("https://x.org/page"), None);
    }

    #[test]
    fn test_extension_of_ignores_host_and_odd_suffixes() {
        assert_eq!(extension_of("https://example.com/"), None);
        assert_eq!(extension_of("https://example.com"), None);
        assert_eq!(extension_of("http://127.0.0.1:8080/"), None);
        assert_eq!(extension_of("https://en.wikipedia.org/wiki/J._R._R._Tolkien"), None);
        assert_eq!(extension_of("https://x.org/files/data.CSV#top").as_deref(), Some("csv"));
        assert_eq!(extension_of("/data/gaia/2023/validation/a.b/file"), None);
    }

    #[test]
    fn test_cache_file_name_is_stable_and_keeps_extension() {
        let a = cache_file_name("https://x.org/data.csv");
        let b = cache_file_name("https://x.org/data.csv");
        assert_eq!(a, b);
        assert!(a.ends_with(".csv"));
        assert_ne!(a, cache_file_name("https://x.org/other.csv"));
    }

    #[tokio::test]
    async fn test_resolve_local_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = resolve_local(&Client::new(), "/definitely/not/here.txt", dir.path()).await;
        assert!(matches!(result, Err(ToolError::FilesystemError(_))));
    }

    #[tokio::test]
    async fn test_resolve_local_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").expect("write");
        let resolved = resolve_local(&Client::new(), file.to_str().expect("utf8"), dir.path())
            .await
            .expect("resolve");
        assert_eq!(resolved, file);
    }
}
