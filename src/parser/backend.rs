//! lopdf access layer.
//!
//! Wraps the opened `lopdf::Document` and answers the few structural
//! questions the engines ask: which pages exist, what their media box and
//! resources are, and what their content stream holds. Everything above this
//! module works on page numbers and decoded bytes.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::detect::{detect_format_from_bytes, detect_format_from_path, open_error};
use crate::error::{BackendError, OpenError};
use crate::model::BBox;

use super::security::{self, PasswordKind};

/// Page identifier: (object number, generation number).
pub type PageId = ObjectId;

/// US Letter, used when a page has no usable media box.
const DEFAULT_MEDIA_BOX: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Guard against cyclic `/Parent` chains.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// An opened, decrypted PDF document.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: BTreeMap<u32, PageId>,
    version: String,
    encrypted: bool,
    decrypted_with: Option<PasswordKind>,
}

impl LopdfBackend {
    /// Load from a file path.
    pub fn load_file(path: &Path, password: Option<&str>) -> Result<Self, OpenError> {
        let format = detect_format_from_path(path)?;
        let doc = LopdfDocument::load(path).map_err(|e| load_error(e, Some(path)))?;
        Self::from_document(doc, format.version, password)
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8], password: Option<&str>) -> Result<Self, OpenError> {
        let format = detect_format_from_bytes(data)?;
        let doc = LopdfDocument::load_mem(data).map_err(|e| load_error(e, None))?;
        Self::from_document(doc, format.version, password)
    }

    fn from_document(
        mut doc: LopdfDocument,
        header_version: String,
        password: Option<&str>,
    ) -> Result<Self, OpenError> {
        let encrypted = security::is_encrypted(&doc);
        let decrypted_with = if encrypted {
            Some(security::decrypt(&mut doc, password)?)
        } else {
            None
        };

        let pages = doc.get_pages();
        let version = if doc.version.is_empty() {
            header_version
        } else {
            doc.version.to_string()
        };
        log::debug!(
            "Loaded PDF {} with {} pages (encrypted: {})",
            version,
            pages.len(),
            encrypted
        );

        Ok(Self {
            doc,
            pages,
            version,
            encrypted,
            decrypted_with,
        })
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Object id of a page (1-indexed).
    pub fn page_id(&self, page_number: u32) -> Option<PageId> {
        self.pages.get(&page_number).copied()
    }

    /// Whether the source carried an `/Encrypt` dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Which password unlocked the document.
    pub fn decrypted_with(&self) -> Option<PasswordKind> {
        self.decrypted_with
    }

    /// PDF version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `/Info` dictionary, `None` when the trailer has none.
    pub fn info_dict(&self) -> Result<Option<&Dictionary>, BackendError> {
        let Ok(info) = self.doc.trailer.get(b"Info") else {
            return Ok(None);
        };
        match self.resolve(info) {
            Object::Dictionary(dict) => Ok(Some(dict)),
            Object::Null => Ok(None),
            Object::Reference(id) => Err(BackendError::new(format!(
                "Info object {} {} R is missing",
                id.0, id.1
            ))),
            _ => Err(BackendError::new("Info entry is not a dictionary")),
        }
    }

    /// Media box of a page in PDF user space, inherited through `/Parent`.
    pub fn media_box(&self, page: PageId) -> BBox {
        self.inherited(page, b"MediaBox")
            .and_then(|obj| self.resolve(obj).as_array().ok())
            .and_then(|arr| {
                let nums: Vec<f32> = arr.iter().filter_map(|o| get_number(self.resolve(o))).collect();
                (nums.len() == 4).then(|| BBox::from_corners(nums[0], nums[1], nums[2], nums[3]))
            })
            .filter(|b| b.is_valid() && b.area() > 0.0)
            .unwrap_or(DEFAULT_MEDIA_BOX)
    }

    /// Resource dictionary of a page, inherited through `/Parent`.
    pub fn page_resources(&self, page: PageId) -> Option<&Dictionary> {
        self.inherited(page, b"Resources")
            .and_then(|obj| self.resolve_dict(obj))
    }

    /// Font dictionaries of a page keyed by resource name.
    pub fn page_fonts(&self, page: PageId) -> Result<BTreeMap<Vec<u8>, &Dictionary>, BackendError> {
        Ok(self.doc.get_page_fonts(page)?)
    }

    /// Concatenated, decompressed content stream bytes of a page.
    pub fn page_content(&self, page: PageId) -> Result<Vec<u8>, BackendError> {
        let page_dict = self.doc.get_dictionary(page)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            // A page without contents is blank, not broken.
            Err(_) => return Ok(Vec::new()),
        };

        match self.resolve(contents) {
            Object::Stream(s) => Ok(stream_bytes(s)),
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Stream(s) = self.resolve(obj) {
                        content.extend_from_slice(&stream_bytes(s));
                        content.push(b' ');
                    }
                }
                Ok(content)
            }
            _ => Err(BackendError::new("Invalid content stream")),
        }
    }

    /// Follow a reference; other objects are returned as they are.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    /// Resolve an object to a dictionary (direct, referenced, or a stream's).
    pub fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj) {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Resolve an object to a stream.
    pub fn resolve_stream<'a>(&'a self, obj: &'a Object) -> Option<(&'a Stream, Option<ObjectId>)> {
        let id = match obj {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        match self.resolve(obj) {
            Object::Stream(s) => Some((s, id)),
            _ => None,
        }
    }

    fn inherited(&self, page: PageId, key: &[u8]) -> Option<&Object> {
        let mut dict = self.doc.get_dictionary(page).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            let parent = dict.get(b"Parent").ok()?;
            dict = self.resolve_dict(parent)?;
        }
        None
    }
}

/// Decoded bytes of a stream, raw bytes when it has no (known) filter.
pub fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Numeric value of an integer or real object.
pub fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Map a lopdf load failure to the matching open error.
fn load_error(err: lopdf::Error, path: Option<&Path>) -> OpenError {
    match (err, path) {
        (lopdf::Error::IO(e), Some(path)) => open_error(path, e),
        (err, _) => OpenError::from(err),
    }
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with byte order mark
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn two_page_doc() -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![first.into(), second.into()],
                "Count" => 2_i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_media_box_inheritance() {
        let backend = LopdfBackend::load_bytes(&two_page_doc(), None).unwrap();
        assert_eq!(backend.page_count(), 2);

        let first = backend.page_id(1).unwrap();
        assert_eq!(backend.media_box(first), BBox::new(0.0, 0.0, 595.0, 842.0));

        let second = backend.page_id(2).unwrap();
        assert_eq!(backend.media_box(second), BBox::new(0.0, 0.0, 300.0, 400.0));
        assert!(backend.page_id(3).is_none());
    }

    #[test]
    fn test_page_without_contents_is_blank() {
        let backend = LopdfBackend::load_bytes(&two_page_doc(), None).unwrap();
        let second = backend.page_id(2).unwrap();
        assert!(backend.page_content(second).unwrap().is_empty());
        let first = backend.page_id(1).unwrap();
        assert_eq!(backend.page_content(first).unwrap(), b"BT ET");
    }

    #[test]
    fn test_not_a_pdf() {
        let result = LopdfBackend::load_bytes(b"hello world", None);
        assert!(matches!(result, Err(OpenError::NotPdf)));
    }

    #[test]
    fn test_decode_text_simple_utf8() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
    }

    #[test]
    fn test_decode_text_simple_latin1() {
        // 0xE9 = 'é' in Latin-1
        let bytes = vec![0x48, 0x65, 0x6C, 0x6C, 0xE9];
        assert_eq!(decode_text_simple(&bytes), "Hellé");
    }

    #[test]
    fn test_decode_text_simple_utf16be() {
        let bytes = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_simple(&bytes), "Hi");
    }

    #[test]
    fn test_get_number() {
        assert_eq!(get_number(&Object::Integer(42)), Some(42.0));
        assert_eq!(get_number(&Object::Real(1.5)), Some(1.5));
        assert_eq!(get_number(&Object::Null), None);
    }
}
