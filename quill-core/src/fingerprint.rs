//! SHA-256 content fingerprints.
//!
//! Fingerprints are rendered as `sha256:<hex>`. Byte fingerprints depend on the
//! bytes only, never on file names, so identical images in different posts
//! share one fingerprint.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, CorpusError};
use crate::types::ContentHash;

const PREFIX: &str = "sha256:";

/// Fingerprint raw bytes.
pub fn of_bytes(bytes: &[u8]) -> ContentHash {
    let mut h = Sha256::new();
    h.update(bytes);
    ContentHash(format!("{PREFIX}{}", hex::encode(h.finalize())))
}

/// Fingerprint text after normalising line endings to LF.
pub fn of_text(text: &str) -> ContentHash {
    of_bytes(text.replace("\r\n", "\n").as_bytes())
}

/// Fingerprint a file by streaming it in 8 KiB chunks.
pub fn of_file(path: &Path) -> Result<ContentHash, CorpusError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut h = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(ContentHash(format!("{PREFIX}{}", hex::encode(h.finalize()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn identical_bytes_share_a_fingerprint_regardless_of_name() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("cover.png");
        let b = tmp.path().join("other-name.png");
        std::fs::write(&a, b"\x89PNG same bytes").unwrap();
        std::fs::write(&b, b"\x89PNG same bytes").unwrap();
        assert_eq!(of_file(&a).unwrap(), of_file(&b).unwrap());
        assert_eq!(of_file(&a).unwrap(), of_bytes(b"\x89PNG same bytes"));
    }

    #[test]
    fn known_digest_has_prefix() {
        let hash = of_bytes(b"");
        assert_eq!(
            hash.0,
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn crlf_and_lf_text_share_a_fingerprint() {
        assert_eq!(of_text("a\r\nb\r\n"), of_text("a\nb\n"));
        assert_ne!(of_text("a\nb\n"), of_text("a\nc\n"));
    }

    #[test]
    fn missing_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let err = of_file(&tmp.path().join("nope.png")).unwrap_err();
        assert!(err.to_string().contains("nope.png"));
    }
}
