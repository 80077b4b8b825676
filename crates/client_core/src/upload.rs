//! Local intake of files before they reach the backend: size/type checks and
//! chunked bodies that report transfer progress.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::{Stream, StreamExt};
use thiserror::Error;

/// Largest file the backend accepts (100 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
];

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("File troppo grande. Massimo 100MB.")]
    TooLarge { size: u64 },
    #[error("Tipo di file non supportato ({mime_type}). Usa PDF o immagini JPEG, PNG, WEBP.")]
    UnsupportedType { mime_type: String },
}

#[derive(Debug, Clone)]
pub enum UploadSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A file picked by the user, described well enough to validate it without
/// reading its content.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub source: UploadSource,
}

impl UploadFile {
    pub fn from_bytes(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: UploadSource::Memory(bytes),
        }
    }

    /// Describes a file on disk; the MIME type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self {
            filename,
            mime_type: guess_mime_type(path),
            size: metadata.len(),
            source: UploadSource::Path(path.to_path_buf()),
        })
    }

    pub async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            UploadSource::Memory(bytes) => Ok(bytes.clone()),
            UploadSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}

pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string()
}

pub fn validate(file: &UploadFile) -> Result<(), UploadRejection> {
    if file.size > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge { size: file.size });
    }
    let mime_type = file.mime_type.trim().to_ascii_lowercase();
    if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(UploadRejection::UnsupportedType {
            mime_type: file.mime_type.clone(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}

pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Splits `bytes` into a body stream that calls `progress` as each chunk is
/// pulled by the transport.
pub fn progress_stream(
    bytes: Vec<u8>,
    progress: ProgressFn,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
    let total = bytes.len() as u64;
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = bytes
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();
    let sent = Arc::new(AtomicU64::new(0));

    tokio_stream::iter(chunks).map(move |chunk| {
        if let Ok(bytes) = &chunk {
            let so_far = sent.fetch_add(bytes.len() as u64, Ordering::AcqRel) + bytes.len() as u64;
            progress(UploadProgress {
                sent: so_far,
                total,
            });
        }
        chunk
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn sized(mime_type: &str, size: u64) -> UploadFile {
        UploadFile {
            filename: "scan".to_string(),
            mime_type: mime_type.to_string(),
            size,
            source: UploadSource::Path(PathBuf::from("/nonexistent/scan")),
        }
    }

    #[test]
    fn accepts_every_supported_type_at_the_size_limit() {
        for mime_type in ACCEPTED_MIME_TYPES {
            assert_eq!(validate(&sized(mime_type, MAX_UPLOAD_BYTES)), Ok(()));
        }
    }

    #[test]
    fn rejects_files_over_the_limit() {
        let rejection = validate(&sized("image/png", 150 * 1024 * 1024)).expect_err("too large");
        assert!(matches!(rejection, UploadRejection::TooLarge { .. }));
        assert_eq!(rejection.to_string(), "File troppo grande. Massimo 100MB.");
    }

    #[test]
    fn rejects_unsupported_types() {
        let rejection = validate(&sized("image/gif", 10)).expect_err("gif");
        assert_eq!(
            rejection,
            UploadRejection::UnsupportedType {
                mime_type: "image/gif".to_string()
            }
        );
        assert!(validate(&sized("application/msword", 10)).is_err());
    }

    #[test]
    fn guesses_mime_types_from_extensions() {
        assert_eq!(guess_mime_type(Path::new("a/report.PDF")), "application/pdf");
        assert_eq!(guess_mime_type(Path::new("photo.webp")), "image/webp");
        assert_eq!(guess_mime_type(Path::new("README")), FALLBACK_MIME_TYPE);
    }

    #[test]
    fn progress_percent_is_clamped() {
        assert_eq!(UploadProgress { sent: 50, total: 200 }.percent(), 25);
        assert_eq!(UploadProgress { sent: 300, total: 200 }.percent(), 100);
        assert_eq!(UploadProgress { sent: 0, total: 0 }.percent(), 100);
    }

    #[tokio::test]
    async fn progress_stream_reports_each_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |update: UploadProgress| {
            sink.lock().expect("lock").push(update.percent());
        });

        let body = vec![7u8; UPLOAD_CHUNK_BYTES * 2 + 10];
        let chunks: Vec<_> = progress_stream(body.clone(), progress).collect().await;

        assert_eq!(chunks.len(), 3);
        let rebuilt: Vec<u8> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.expect("chunk"))
            .collect();
        assert_eq!(rebuilt, body);
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.last().copied(), Some(100));
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn from_path_reads_metadata_without_loading_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("invoice.png");
        tokio::fs::write(&path, b"png-bytes").await.expect("write");

        let file = UploadFile::from_path(&path).await.expect("describe");
        assert_eq!(file.filename, "invoice.png");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size, 9);
        assert_eq!(file.read_all().await.expect("read"), b"png-bytes");
    }
}
