//! Metadata header codec.
//!
//! A post file is a YAML header between two `---` lines followed by the body:
//!
//! ```text
//! ---
//! title: Hello
//! date: 2025-10-12T10:00:00Z
//! status: draft
//! ---
//! Body text with ![an image](./cover.png).
//! ```
//!
//! The header is always rewritten as a whole; there are no field-level edits.

use std::path::Path;

use crate::error::CorpusError;
use crate::types::{Metadata, SCHEMA_VERSION};

const DELIMITER: &str = "---";

/// Split a post file into its parsed header and body.
pub fn parse(content: &str, path: &Path) -> Result<(Metadata, String), CorpusError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let missing = || CorpusError::MissingHeader {
        path: path.to_path_buf(),
    };

    let mut lines = content.split_inclusive('\n');
    let first = lines.next().ok_or_else(missing)?;
    if first.trim_end() != DELIMITER {
        return Err(missing());
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let header = &content[header_start..offset];
            let body = &content[offset + line.len()..];
            let metadata = parse_header(header, path)?;
            return Ok((metadata, body.to_owned()));
        }
        offset += line.len();
    }
    Err(missing())
}

fn parse_header(header: &str, path: &Path) -> Result<Metadata, CorpusError> {
    // An empty header is a mapping with no keys, not YAML null.
    if header.trim().is_empty() {
        return serde_yaml::from_str("{}").map_err(|source| CorpusError::Parse {
            path: path.to_path_buf(),
            source,
        });
    }
    serde_yaml::from_str(header).map_err(|source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a header and body back into post file text.
pub fn serialize(metadata: &Metadata, body: &str) -> Result<String, CorpusError> {
    let yaml = serde_yaml::to_string(metadata)?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

/// Check the fields every post must carry before anything is sent remotely.
pub fn validate(metadata: &Metadata, path: &Path) -> Result<(), CorpusError> {
    if metadata.schema_version > SCHEMA_VERSION {
        return Err(CorpusError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: metadata.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    if metadata.title.trim().is_empty() {
        return Err(CorpusError::MissingField {
            path: path.to_path_buf(),
            field: "title",
        });
    }
    if metadata.date.is_none() {
        return Err(CorpusError::MissingField {
            path: path.to_path_buf(),
            field: "date",
        });
    }
    Ok(())
}
