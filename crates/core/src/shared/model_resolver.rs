use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configured model {0} does not exist")]
    MissingExplicit(PathBuf),
    #[error("model {0} not found in cache and no download URL configured")]
    NotFound(String),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for a detector model.
pub struct ModelSource<'a> {
    pub name: &'a str,
    pub explicit_path: Option<&'a Path>,
    pub url: Option<&'a str>,
}

/// Resolve a model file, checking in order:
/// 1. An explicitly configured path (must exist)
/// 2. The user cache directory
/// 3. Download from the configured URL into the cache
pub fn resolve(
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.explicit_path {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::MissingExplicit(path.to_path_buf()))
        };
    }
    resolve_in(&model_cache_dir()?, source, progress)
}

fn resolve_in(
    cache_dir: &Path,
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(source.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    let url = source
        .url
        .ok_or_else(|| ModelResolveError::NotFound(source.name.to_string()))?;
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {url}", source.name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceCapture/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceCapture/models/` or `~/.cache/FaceCapture/models/`
/// - Windows: `%LOCALAPPDATA%/FaceCapture/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceCapture").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceCapture").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| ModelResolveError::Write { path, source: e }
    };

    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut reader = response;
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("mine.onnx");
        fs::write(&model, b"model").unwrap();

        let source = ModelSource {
            name: "other.onnx",
            explicit_path: Some(&model),
            url: None,
        };
        assert_eq!(resolve(&source, None).unwrap(), model);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("missing.onnx");
        let source = ModelSource {
            name: "missing.onnx",
            explicit_path: Some(&model),
            url: Some("http://invalid.example.com/model.onnx"),
        };
        assert!(matches!(
            resolve(&source, None),
            Err(ModelResolveError::MissingExplicit(_))
        ));
    }

    #[test]
    fn test_resolve_finds_cached_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cached.onnx"), b"fake model data").unwrap();

        let source = ModelSource {
            name: "cached.onnx",
            explicit_path: None,
            url: None,
        };
        let path = resolve_in(tmp.path(), &source, None).unwrap();
        assert_eq!(path, tmp.path().join("cached.onnx"));
    }

    #[test]
    fn test_resolve_without_url_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let source = ModelSource {
            name: "absent.onnx",
            explicit_path: None,
            url: None,
        };
        assert!(matches!(
            resolve_in(tmp.path(), &source, None),
            Err(ModelResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("FaceCapture"));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
