//! Body rewriting from an explicit reference → hash → URL table.

use quill_core::{references, ContentHash, ContentUnit};

use crate::asset_index::AssetIndex;
use crate::error::SyncError;

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub reference: String,
    pub content_hash: ContentHash,
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTable {
    rows: Vec<Resolution>,
}

impl ResolutionTable {
    /// Rows for every asset of `unit`, with whatever URL it already has.
    pub fn from_unit(unit: &ContentUnit) -> Self {
        let mut table = Self::default();
        for (reference, record) in &unit.assets {
            table.set(reference, &record.content_hash, record.remote_url.clone());
        }
        table
    }

    /// Like [`from_unit`](Self::from_unit), with missing URLs filled from
    /// the index. No network.
    pub fn known(unit: &ContentUnit, index: &AssetIndex) -> Result<Self, SyncError> {
        let mut table = Self::from_unit(unit);
        for row in &mut table.rows {
            if row.remote_url.is_none() {
                row.remote_url = index.lookup(&row.content_hash)?.map(|e| e.remote_url);
            }
        }
        Ok(table)
    }

    /// Insert or replace the row for `reference`.
    pub fn set(&mut self, reference: &str, content_hash: &ContentHash, remote_url: Option<String>) {
        let row = Resolution {
            reference: reference.to_owned(),
            content_hash: content_hash.clone(),
            remote_url,
        };
        match self.rows.iter_mut().find(|r| r.reference == reference) {
            Some(existing) => *existing = row,
            None => self.rows.push(row),
        }
    }

    pub fn get(&self, reference: &str) -> Option<&Resolution> {
        self.rows.iter().find(|r| r.reference == reference)
    }

    pub fn url_for(&self, reference: &str) -> Option<&str> {
        self.get(reference).and_then(|r| r.remote_url.as_deref())
    }

    pub fn rows(&self) -> &[Resolution] {
        &self.rows
    }
}

/// A rewritten body and the references that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub body: String,
    /// Distinct references left untouched, in order of first appearance.
    pub unresolved: Vec<String>,
}

/// Replace every resolvable reference in `body` with its URL.
pub fn rewrite(body: &str, table: &ResolutionTable) -> Rewritten {
    let unresolved = references::distinct(body)
        .into_iter()
        .filter(|reference| table.url_for(reference).is_none())
        .collect();
    Rewritten {
        body: references::replace(body, |reference| table.url_for(reference)),
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> ContentHash {
        ContentHash::from(s)
    }

    #[test]
    fn replaces_every_occurrence_of_resolved_references() {
        let mut table = ResolutionTable::default();
        table.set("a.png", &hash("sha256:1"), Some("https://cdn/1.png".to_string()));
        let out = rewrite(
            "![x](a.png)\n\n<img src=\"./a.png\" alt=\"again\">\n",
            &table,
        );
        assert_eq!(
            out.body,
            "![x](https://cdn/1.png)\n\n<img src=\"https://cdn/1.png\" alt=\"again\">\n"
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn unresolved_references_are_left_and_reported() {
        let mut table = ResolutionTable::default();
        table.set("a.png", &hash("sha256:1"), Some("https://cdn/1.png".to_string()));
        table.set("b.png", &hash("sha256:2"), None);
        let out = rewrite("![a](a.png) ![b](b.png) ![c](c.png) ![b](b.png)\n", &table);
        assert_eq!(
            out.body,
            "![a](https://cdn/1.png) ![b](b.png) ![c](c.png) ![b](b.png)\n"
        );
        assert_eq!(out.unresolved, vec!["b.png", "c.png"]);
    }

    #[test]
    fn references_in_code_fences_are_not_rewritten() {
        let mut table = ResolutionTable::default();
        table.set("a.png", &hash("sha256:1"), Some("https://cdn/1.png".to_string()));
        let body = "```md\n![a](a.png)\n```\n";
        assert_eq!(rewrite(body, &table).body, body);
    }

    #[test]
    fn set_replaces_existing_row() {
        let mut table = ResolutionTable::default();
        table.set("a.png", &hash("sha256:1"), None);
        table.set("a.png", &hash("sha256:1"), Some("https://cdn/1.png".to_string()));
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.url_for("a.png"), Some("https://cdn/1.png"));
    }
}
