//! Document-level types.

use crate::detect::DocumentFormat;
use crate::error::Result;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Prefix for the names of masked outputs.
pub const MASKED_PREFIX: &str = "masked_";

/// A document submitted for scanning or masking.
///
/// The content is immutable and shared; every stage reads it from the
/// start through its own cursor, so scanning and masking the same
/// document never interfere.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    format: DocumentFormat,
    data: Arc<[u8]>,
}

impl Document {
    /// Create a document whose format is derived from its name.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<Self> {
        let name = name.into();
        let format = DocumentFormat::from_name(&name)?;
        Ok(Self::with_format(name, format, data))
    }

    /// Create a document with an explicitly declared format.
    pub fn with_format(
        name: impl Into<String>,
        format: DocumentFormat,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            data: Arc::from(data.into()),
        }
    }

    /// Read a document from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment.bin".to_string());
        let data = std::fs::read(path)?;
        Self::new(name, data)
    }

    /// Read a document from a reusable stream.
    ///
    /// The stream is rewound before reading and again afterwards, so the
    /// caller can hand the same stream to the next consumer.
    pub fn from_reader<R: Read + Seek>(name: impl Into<String>, reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        let read = reader.read_to_end(&mut data);
        reader.seek(SeekFrom::Start(0))?;
        read?;
        Self::new(name, data)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared format.
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Raw content.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Declared MIME type.
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Name given to the masked copy of this document.
    pub fn masked_name(&self) -> String {
        format!("{}{}", MASKED_PREFIX, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_document_from_name() {
        let doc = Document::new("memo.txt", b"hello".to_vec()).unwrap();
        assert_eq!(doc.format(), DocumentFormat::Text);
        assert_eq!(doc.size(), 5);
        assert_eq!(doc.content_type(), "text/plain");
        assert_eq!(doc.masked_name(), "masked_memo.txt");
    }

    #[test]
    fn test_document_unsupported() {
        assert!(Document::new("memo.hwp", Vec::new()).is_err());
    }

    #[test]
    fn test_from_reader_rewinds() {
        let mut cursor = Cursor::new(b"abc".to_vec());
        cursor.seek(SeekFrom::Start(2)).unwrap();

        let doc = Document::from_reader("x.txt", &mut cursor).unwrap();
        assert_eq!(doc.data(), b"abc");
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_clone_shares_content() {
        let doc = Document::new("a.txt", vec![1u8; 1024]).unwrap();
        let copy = doc.clone();
        assert_eq!(doc.data().as_ptr(), copy.data().as_ptr());
    }
}
