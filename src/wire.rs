//! The fixed-size wire format shared by client and server.
//!
//! Grounded on `include/defs.h`'s `Request` struct and `Operation` enum.
//! Field reuse (e.g. `title` carrying the key for REMOVE/CONSULT, or the
//! keyword for LIST_WORD) is preserved verbatim per SPEC_FULL.md §3.

use crate::document::{AUTHORS_SIZE, PATH_SIZE, TITLE_SIZE, YEAR_SIZE};

/// Size of the `title`/`authors`/`year`/`path` fields plus the 8-byte header
/// (`client` pid + `operation` tag), both encoded as little-endian `i32`.
pub const REQUEST_SIZE: usize = 4 + 4 + TITLE_SIZE + AUTHORS_SIZE + YEAR_SIZE + PATH_SIZE;

/// Operation tags, in wire-declaration order (`include/defs.h`'s `Operation` enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Index = 0,
    Remove = 1,
    Consult = 2,
    CountWord = 3,
    ListWord = 4,
    Shutdown = 5,
    Kill = 6,
}

impl Operation {
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Operation::Index),
            1 => Some(Operation::Remove),
            2 => Some(Operation::Consult),
            3 => Some(Operation::CountWord),
            4 => Some(Operation::ListWord),
            5 => Some(Operation::Shutdown),
            6 => Some(Operation::Kill),
            _ => None,
        }
    }

    /// The single-letter audit-log tag for this operation (SPEC_FULL.md §4.9).
    pub fn log_letter(self) -> char {
        match self {
            Operation::Index => 'A',
            Operation::Remove => 'D',
            Operation::Consult => 'C',
            Operation::CountWord => 'L',
            Operation::ListWord => 'S',
            Operation::Kill => 'K',
            Operation::Shutdown => 'F',
        }
    }
}

fn write_fixed(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..n]);
    buf.extend(std::iter::repeat(0u8).take(width - n));
}

fn read_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// A request as received from `SERVER_FIFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub client_pid: i32,
    pub operation: Operation,
    pub title: String,
    pub authors: String,
    pub year: String,
    pub path: String,
}

impl Request {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(REQUEST_SIZE);
        buf.extend_from_slice(&self.client_pid.to_le_bytes());
        buf.extend_from_slice(&(self.operation as i32).to_le_bytes());
        write_fixed(&mut buf, &self.title, TITLE_SIZE);
        write_fixed(&mut buf, &self.authors, AUTHORS_SIZE);
        write_fixed(&mut buf, &self.year, YEAR_SIZE);
        write_fixed(&mut buf, &self.path, PATH_SIZE);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != REQUEST_SIZE {
            return None;
        }
        let client_pid = i32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let tag = i32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let operation = Operation::from_tag(tag)?;

        let mut offset = 8;
        let title = read_fixed(&bytes[offset..offset + TITLE_SIZE]);
        offset += TITLE_SIZE;
        let authors = read_fixed(&bytes[offset..offset + AUTHORS_SIZE]);
        offset += AUTHORS_SIZE;
        let year = read_fixed(&bytes[offset..offset + YEAR_SIZE]);
        offset += YEAR_SIZE;
        let path = read_fixed(&bytes[offset..offset + PATH_SIZE]);

        Some(Request {
            client_pid,
            operation,
            title,
            authors,
            year,
            path,
        })
    }

    /// Renders this request's arguments the way the audit log expects them
    /// (SPEC_FULL.md §4.9): INDEX gets all four fields, everything else gets
    /// whichever of title/authors is meaningful for that op.
    pub fn audit_args(&self) -> String {
        match self.operation {
            Operation::Index => format!("{} {} {} {}", self.title, self.authors, self.year, self.path),
            Operation::Remove | Operation::Consult => self.title.clone(),
            Operation::CountWord | Operation::ListWord => format!("{} {}", self.title, self.authors),
            Operation::Kill | Operation::Shutdown => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_bytes() {
        let req = Request {
            client_pid: 1234,
            operation: Operation::Index,
            title: "T1".to_string(),
            authors: "A1".to_string(),
            year: "2020".to_string(),
            path: "t1.txt".to_string(),
        };
        let bytes = req.to_bytes();
        assert_eq!(bytes.len(), REQUEST_SIZE);
        let back = Request::from_bytes(&bytes).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn operation_tags_match_wire_order() {
        assert_eq!(Operation::Index as i32, 0);
        assert_eq!(Operation::Remove as i32, 1);
        assert_eq!(Operation::Consult as i32, 2);
        assert_eq!(Operation::CountWord as i32, 3);
        assert_eq!(Operation::ListWord as i32, 4);
        assert_eq!(Operation::Shutdown as i32, 5);
        assert_eq!(Operation::Kill as i32, 6);
    }

    #[test]
    fn audit_args_render_per_operation() {
        let req = Request {
            client_pid: 1,
            operation: Operation::CountWord,
            title: "5".to_string(),
            authors: "foo".to_string(),
            year: String::new(),
            path: String::new(),
        };
        assert_eq!(req.audit_args(), "5 foo");
    }
}
