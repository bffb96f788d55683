use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, warn};

use crate::errors::GenerationError;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime)
}

/// A user-selected file, base64-encoded for inline transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub data: String,
    pub mime_type: String,
    pub name: String,
    pub size_bytes: u64,
}

impl EncodedFile {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

pub fn encode_bytes(name: &str, bytes: &[u8], mime_type: &str) -> EncodedFile {
    EncodedFile {
        data: general_purpose::STANDARD.encode(bytes),
        mime_type: mime_type.to_string(),
        name: name.to_string(),
        size_bytes: bytes.len() as u64,
    }
}

pub async fn encode_file(path: &Path) -> Result<EncodedFile, GenerationError> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        warn!("Failed to read attachment {}: {}", path.display(), err);
        GenerationError::FileRead {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    })?;

    let mime_type = detect_mime_type(&bytes)
        .or_else(|| mime_for_extension(path).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    debug!(
        "Encoded attachment {} ({} bytes, mime={})",
        name,
        bytes.len(),
        mime_type
    );
    Ok(encode_bytes(&name, &bytes, &mime_type))
}

pub fn describe_size(size_bytes: u64) -> String {
    format!("{:.1} KB", size_bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[tokio::test]
    async fn encodes_text_file_using_extension_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Reading list").unwrap();

        let encoded = encode_file(&path).await.unwrap();
        assert_eq!(encoded.name, "notes.md");
        assert_eq!(encoded.mime_type, "text/markdown");
        assert_eq!(encoded.size_bytes, 14);
        assert_eq!(
            general_purpose::STANDARD.decode(&encoded.data).unwrap(),
            b"# Reading list"
        );
        assert!(!encoded.is_image());
    }

    #[tokio::test]
    async fn sniffs_image_bytes_regardless_of_extension() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(&PNG_HEADER).unwrap();

        let encoded = encode_file(file.path()).await.unwrap();
        assert_eq!(encoded.mime_type, "image/png");
        assert!(encoded.is_image());
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = encode_file(&dir.path().join("gone.pdf")).await.unwrap_err();
        assert!(matches!(err, GenerationError::FileRead { .. }));
    }

    #[test]
    fn size_is_rendered_in_kilobytes() {
        assert_eq!(describe_size(2048), "2.0 KB");
        assert_eq!(describe_size(1536), "1.5 KB");
    }
}
