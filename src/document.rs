//! The fixed-width document metadata record.
//!
//! Grounded on `include/document.h` / `src/document.c` in the original source: a plain
//! struct of four fixed-size text fields, with `title`/`authors`/`path` NUL-terminated
//! C strings and `year` a bare 4-byte field with no room for a terminator.

use std::fmt;

/// Maximum length of the `title` field, including the NUL terminator.
pub const TITLE_SIZE: usize = 200;
/// Maximum length of the `authors` field, including the NUL terminator.
pub const AUTHORS_SIZE: usize = 200;
/// Exact length of the `year` field. No terminator fits: callers must not treat
/// this as a C string (see SPEC_FULL.md §9, Open Questions).
pub const YEAR_SIZE: usize = 4;
/// Maximum length of the `path` field, including the NUL terminator.
pub const PATH_SIZE: usize = 64;

/// On-disk and on-wire size of a [`Document`], in bytes.
pub const RECORD_SIZE: usize = TITLE_SIZE + AUTHORS_SIZE + YEAR_SIZE + PATH_SIZE;

/// A single fixed-width document metadata record.
///
/// Every record occupies exactly [`RECORD_SIZE`] bytes on disk and on the wire,
/// regardless of how short the contained strings are.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    title: [u8; TITLE_SIZE],
    authors: [u8; AUTHORS_SIZE],
    year: [u8; YEAR_SIZE],
    path: [u8; PATH_SIZE],
}

/// The sentinel title used to signal a missing document in a CONSULT reply,
/// matching the source's `"Document was not found"` literal.
pub const NOT_FOUND_TITLE: &str = "Document was not found";

fn copy_into(dst: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    let n = bytes.len().min(dst.len().saturating_sub(1));
    dst[..n].copy_from_slice(&bytes[..n]);
    for b in &mut dst[n..] {
        *b = 0;
    }
}

fn str_from(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl Document {
    /// Builds a new record, truncating fields that exceed their field width.
    /// `year` is copied verbatim (it has no terminator byte to reserve).
    pub fn new(title: &str, authors: &str, year: &str, path: &str) -> Self {
        let mut doc = Document {
            title: [0; TITLE_SIZE],
            authors: [0; AUTHORS_SIZE],
            year: [0; YEAR_SIZE],
            path: [0; PATH_SIZE],
        };
        copy_into(&mut doc.title, title);
        copy_into(&mut doc.authors, authors);
        let year_bytes = year.as_bytes();
        let n = year_bytes.len().min(YEAR_SIZE);
        doc.year[..n].copy_from_slice(&year_bytes[..n]);
        copy_into(&mut doc.path, path);
        doc
    }

    /// A record whose title is the well-known "not found" sentinel and every
    /// other field is empty.
    pub fn not_found() -> Self {
        Document::new(NOT_FOUND_TITLE, "", "", "")
    }

    pub fn title(&self) -> String {
        str_from(&self.title)
    }

    pub fn authors(&self) -> String {
        str_from(&self.authors)
    }

    /// Raw 4-byte year field, not NUL-terminated.
    pub fn year_bytes(&self) -> [u8; YEAR_SIZE] {
        self.year
    }

    pub fn year(&self) -> String {
        String::from_utf8_lossy(&self.year).trim_end_matches('\0').to_string()
    }

    pub fn path(&self) -> String {
        str_from(&self.path)
    }

    /// Serializes the record into its fixed-width on-disk/on-wire form.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let mut offset = 0;
        out[offset..offset + TITLE_SIZE].copy_from_slice(&self.title);
        offset += TITLE_SIZE;
        out[offset..offset + AUTHORS_SIZE].copy_from_slice(&self.authors);
        offset += AUTHORS_SIZE;
        out[offset..offset + YEAR_SIZE].copy_from_slice(&self.year);
        offset += YEAR_SIZE;
        out[offset..offset + PATH_SIZE].copy_from_slice(&self.path);
        out
    }

    /// Parses a record out of exactly [`RECORD_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut offset = 0;
        let mut title = [0u8; TITLE_SIZE];
        title.copy_from_slice(&bytes[offset..offset + TITLE_SIZE]);
        offset += TITLE_SIZE;
        let mut authors = [0u8; AUTHORS_SIZE];
        authors.copy_from_slice(&bytes[offset..offset + AUTHORS_SIZE]);
        offset += AUTHORS_SIZE;
        let mut year = [0u8; YEAR_SIZE];
        year.copy_from_slice(&bytes[offset..offset + YEAR_SIZE]);
        offset += YEAR_SIZE;
        let mut path = [0u8; PATH_SIZE];
        path.copy_from_slice(&bytes[offset..offset + PATH_SIZE]);
        Document {
            title,
            authors,
            year,
            path,
        }
    }

    /// True if the title field equals the "not found" sentinel.
    pub fn is_not_found(&self) -> bool {
        self.title() == NOT_FOUND_TITLE
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("title", &self.title())
            .field("authors", &self.authors())
            .field("year", &self.year())
            .field("path", &self.path())
            .finish()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title: {}", self.title())?;
        writeln!(f, "Authors: {}", self.authors())?;
        writeln!(f, "Year: {}", self.year())?;
        write!(f, "Path: {}", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let doc = Document::new("T1", "A1", "2020", "t1.txt");
        let bytes = doc.to_bytes();
        let back = Document::from_bytes(&bytes);
        assert_eq!(doc, back);
        assert_eq!(back.title(), "T1");
        assert_eq!(back.authors(), "A1");
        assert_eq!(back.year(), "2020");
        assert_eq!(back.path(), "t1.txt");
    }

    #[test]
    fn truncates_overlong_fields() {
        let long_title = "x".repeat(TITLE_SIZE + 50);
        let doc = Document::new(&long_title, "A", "2020", "p");
        assert_eq!(doc.title().len(), TITLE_SIZE - 1);
    }

    #[test]
    fn not_found_sentinel_round_trips() {
        let doc = Document::not_found();
        assert!(doc.is_not_found());
        let bytes = doc.to_bytes();
        assert!(Document::from_bytes(&bytes).is_not_found());
    }

    #[test]
    fn year_has_no_terminator_reserved() {
        let doc = Document::new("T", "A", "2020", "p");
        assert_eq!(doc.year_bytes(), *b"2020");
    }
}
