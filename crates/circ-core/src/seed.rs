use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::book::{Book, BookId, MemberId};

/// A book as written in a seed file. Seeded books always start available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBook {
    /// Book identifier.
    pub id: BookId,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Author.
    #[serde(default)]
    pub author: String,
}

/// Initial catalog and membership for an engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    /// Pre-registered members.
    #[serde(default)]
    pub members: Vec<MemberId>,
    /// Initial catalog.
    #[serde(default)]
    pub books: Vec<SeedBook>,
}

impl SeedFile {
    /// Parse a seed document.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let mut seed: Self = serde_json::from_str(raw)?;
        seed.normalize();
        Ok(seed)
    }

    /// Read and parse a seed file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read seed file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parse seed file {}", path.display()))
    }

    /// Catalog entries, ready to hand to an engine.
    pub fn catalog(&self) -> Vec<Book> {
        self.books
            .iter()
            .map(|b| Book::new(b.id, b.title.clone(), b.author.clone()))
            .collect()
    }

    fn normalize(&mut self) {
        self.members.sort_unstable();
        self.members.dedup();
        for book in &mut self.books {
            book.title = book.title.trim().to_string();
            book.author = book.author.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookStatus;

    #[test]
    fn parses_and_normalizes() {
        let seed = SeedFile::from_json(
            r#"{
                "members": [7, 3, 7],
                "books": [{ "id": 1, "title": " Dune ", "author": "Herbert" }]
            }"#,
        )
        .unwrap();

        assert_eq!(seed.members, vec![3, 7]);
        let catalog = seed.catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].title, "Dune");
        assert_eq!(catalog[0].status, BookStatus::Available);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let seed = SeedFile::from_json("{}").unwrap();
        assert!(seed.members.is_empty());
        assert!(seed.books.is_empty());
        assert!(SeedFile::from_json("[1, 2]").is_err());
    }
}
