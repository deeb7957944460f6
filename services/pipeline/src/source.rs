//! Reading the raw extract off disk.

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Decoded contents of one source file plus its fingerprint.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub content: String,
    /// `sha256:<hex>` over the raw bytes.
    pub content_hash: String,
    /// True when invalid UTF-8 sequences had to be replaced.
    pub had_decode_errors: bool,
}

impl SourceText {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "read source file");
        Ok(Self::from_bytes(&bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let content_hash = format!("sha256:{:x}", hasher.finalize());

        // Strips a UTF-8 BOM if present
        let (content, had_decode_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
        if had_decode_errors {
            warn!("source contains invalid UTF-8; offending bytes were replaced");
        }

        Self {
            content: content.into_owned(),
            content_hash,
            had_decode_errors,
        }
    }
}

impl From<&str> for SourceText {
    fn from(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "h1|h2\nD|x\n").unwrap();

        let source = SourceText::read(file.path()).unwrap();
        assert_eq!(source.content, "h1|h2\nD|x\n");
        assert!(!source.had_decode_errors);
        assert!(source.content_hash.starts_with("sha256:"));
        assert_eq!(source.content_hash.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceText::read(&dir.path().join("nope.txt"));
        assert!(matches!(result, Err(PipelineError::FileRead { .. })));
    }

    #[test]
    fn test_bom_removed() {
        let source = SourceText::from_bytes(b"\xEF\xBB\xBFa|b\n");
        assert_eq!(source.content, "a|b\n");
        assert!(!source.had_decode_errors);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let source = SourceText::from_bytes(b"a|b\xFF\n");
        assert!(source.had_decode_errors);
        assert_eq!(source.content, "a|b\u{FFFD}\n");
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = SourceText::from("x|y\n");
        let b = SourceText::from("x|y\n");
        let c = SourceText::from("x|z\n");
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }
}
