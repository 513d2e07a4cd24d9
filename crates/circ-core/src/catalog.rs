use std::collections::HashMap;

use crate::book::{Book, BookId, BookStatus};
use crate::error::{CirculationError, Result};

/// Authoritative mapping of book identity to book record.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    books: HashMap<BookId, Book>,
}

impl Catalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by ID, returning the previous record if there was one.
    pub fn add(&mut self, book: Book) -> Option<Book> {
        self.books.insert(book.id, book)
    }

    /// Delete a book.
    pub fn remove(&mut self, id: BookId) -> Result<Book> {
        self.books.remove(&id).ok_or(CirculationError::BookNotFound(id))
    }

    /// Look up a book.
    pub fn get(&self, id: BookId) -> Result<&Book> {
        self.books.get(&id).ok_or(CirculationError::BookNotFound(id))
    }

    /// Update the status of an existing book.
    pub fn set_status(&mut self, id: BookId, status: BookStatus) -> Result<()> {
        let book = self
            .books
            .get_mut(&id)
            .ok_or(CirculationError::BookNotFound(id))?;
        book.status = status;
        Ok(())
    }

    /// Whether a book with this ID exists.
    pub fn contains(&self, id: BookId) -> bool {
        self.books.contains_key(&id)
    }

    /// Every available book. Order is unspecified.
    pub fn list_available(&self) -> Vec<Book> {
        self.books
            .values()
            .filter(|b| b.is_available())
            .cloned()
            .collect()
    }

    /// All books. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    /// Number of books.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overwrites_by_id() {
        let mut catalog = Catalog::new();
        assert!(catalog.add(Book::new(1, "Dune", "Herbert")).is_none());
        let prev = catalog.add(Book::new(1, "Dune Messiah", "Herbert"));
        assert_eq!(prev.map(|b| b.title), Some("Dune".to_string()));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(1).map(|b| b.title.as_str()), Ok("Dune Messiah"));
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut catalog = Catalog::new();
        assert_eq!(catalog.remove(9), Err(CirculationError::BookNotFound(9)));

        catalog.add(Book::new(9, "Solaris", "Lem"));
        assert!(catalog.remove(9).is_ok());
        assert!(catalog.is_empty());
    }

    #[test]
    fn list_available_skips_borrowed() {
        let mut catalog = Catalog::new();
        catalog.add(Book::new(1, "Dune", "Herbert"));
        catalog.add(Book::new(2, "Solaris", "Lem"));
        catalog.set_status(2, BookStatus::Borrowed).unwrap();

        let mut ids: Vec<BookId> = catalog.list_available().iter().map(|b| b.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1]);
        assert_eq!(
            catalog.set_status(3, BookStatus::Borrowed),
            Err(CirculationError::BookNotFound(3))
        );
    }
}
