//! Writing downloaded results to disk

use crate::error::{DownloaderError, Result};
use crate::filename::{has_extension, DEFAULT_FILENAME};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Give up looking for a free name after this many numbered variants
const MAX_NAME_VARIANTS: u32 = 10_000;

/// Reduce a server-suggested name to a single safe path component
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `name (n).ext` for n >= 1, `name` itself for n == 0
fn numbered_variant(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    if has_extension(name) {
        if let Some((stem, ext)) = name.rsplit_once('.') {
            return format!("{} ({}).{}", stem, n, ext);
        }
    }
    format!("{} ({})", name, n)
}

/// Save `bytes` under `filename` in `dir`, never overwriting an existing file.
///
/// Returns the path actually written.
pub async fn save_blob(bytes: &[u8], filename: &str, dir: &Path) -> Result<PathBuf> {
    let save_error = |path: &Path, source| DownloaderError::Save {
        path: path.display().to_string(),
        source,
    };

    fs::create_dir_all(dir)
        .await
        .map_err(|e| save_error(dir, e))?;

    let name = sanitize_filename(filename);
    for n in 0..MAX_NAME_VARIANTS {
        let path = dir.join(numbered_variant(&name, n));
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} exists, trying next name", path.display());
                continue;
            }
            Err(e) => return Err(save_error(&path, e)),
        };

        write_or_discard(file, bytes, &path)
            .await
            .map_err(|e| save_error(&path, e))?;

        info!("Saved {} bytes to {}", bytes.len(), path.display());
        return Ok(path);
    }

    let path = dir.join(&name);
    Err(save_error(
        &path,
        std::io::Error::new(ErrorKind::AlreadyExists, "no free filename left"),
    ))
}

/// Write `bytes` through `writer`, removing the half-written file at `path` on failure
async fn write_or_discard<W>(mut writer: W, bytes: &[u8], path: &Path) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };
    drop(writer);

    if written.is_err() {
        if let Err(e) = fs::remove_file(path).await {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts nothing, like a full disk
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("what?.mp4"), "what_.mp4");
        assert_eq!(sanitize_filename(".."), "download");
        assert_eq!(sanitize_filename("   "), "download");
    }

    #[test]
    fn test_numbered_variant() {
        assert_eq!(numbered_variant("clip.mp4", 0), "clip.mp4");
        assert_eq!(numbered_variant("clip.mp4", 2), "clip (2).mp4");
        assert_eq!(numbered_variant("clip", 1), "clip (1)");
    }

    #[tokio::test]
    async fn test_save_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();

        let first = save_blob(b"one", "clip.mp4", dir.path()).await.unwrap();
        let second = save_blob(b"two", "clip.mp4", dir.path()).await.unwrap();

        assert_eq!(first, dir.path().join("clip.mp4"));
        assert_eq!(second, dir.path().join("clip (1).mp4"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let path = save_blob(b"data", "x.mp3", &nested).await.unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"par").unwrap();

        let err = write_or_discard(FullDisk, b"payload", &path).await.unwrap_err();
        assert_eq!(err.to_string(), "no space left");
        assert!(!path.exists());

        let saved = save_blob(b"retry", "clip.mp4", dir.path()).await.unwrap();
        assert_eq!(saved, path);
    }

    #[tokio::test]
    async fn test_successful_write_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let file = tokio::fs::File::create(&path).await.unwrap();

        write_or_discard(file, b"payload", &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }
}
