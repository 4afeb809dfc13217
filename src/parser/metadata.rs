//! Document Info dictionary reader.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Object};

use crate::error::BackendError;
use crate::model::Metadata;

use super::backend::LopdfBackend;

/// Info keys mapped to dedicated [`Metadata`] fields.
const KNOWN_KEYS: [&[u8]; 8] = [
    b"Title",
    b"Author",
    b"Subject",
    b"Keywords",
    b"Creator",
    b"Producer",
    b"CreationDate",
    b"ModDate",
];

/// Serialized [`Metadata`] field names. `extra` is flattened next to them,
/// so custom keys must not collide.
const FIELD_NAMES: [&str; 12] = [
    "title",
    "author",
    "subject",
    "keywords",
    "creator",
    "producer",
    "creation_date",
    "mod_date",
    "page_count",
    "encrypted",
    "decrypted_with",
    "pdf_version",
];

/// Read document metadata: Info strings, dates, page count, encryption
/// status and version. Absent or empty keys stay `None`.
///
/// Fails only when the trailer's `/Info` entry is not a dictionary.
pub fn read_metadata(backend: &LopdfBackend) -> Result<Metadata, BackendError> {
    let mut metadata = Metadata::with_page_count(backend.page_count());
    metadata.encrypted = backend.is_encrypted();
    metadata.decrypted_with = backend.decrypted_with().map(|k| k.as_str().to_string());
    metadata.pdf_version = Some(backend.version().to_string()).filter(|v| !v.is_empty());

    let Some(info) = backend.info_dict()? else {
        log::debug!("No Info dictionary");
        return Ok(metadata);
    };

    let text = |key: &[u8]| {
        info.get(key)
            .ok()
            .and_then(|obj| object_string(backend.resolve(obj)))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    metadata.title = text(b"Title");
    metadata.author = text(b"Author");
    metadata.subject = text(b"Subject");
    metadata.keywords = text(b"Keywords");
    metadata.creator = text(b"Creator");
    metadata.producer = text(b"Producer");
    metadata.creation_date = text(b"CreationDate").and_then(|d| parse_pdf_date(&d));
    metadata.mod_date = text(b"ModDate").and_then(|d| parse_pdf_date(&d));

    collect_custom_keys(backend, info, &mut metadata);
    Ok(metadata)
}

/// Non-standard Info entries with string values go into `extra`.
fn collect_custom_keys(backend: &LopdfBackend, info: &Dictionary, metadata: &mut Metadata) {
    for (key, value) in info.iter() {
        if KNOWN_KEYS.contains(&key.as_slice()) || key.as_slice() == b"Trapped" {
            continue;
        }
        if let Some(value) = object_string(backend.resolve(value)).filter(|v| !v.trim().is_empty()) {
            let key = String::from_utf8_lossy(key).to_lowercase();
            if FIELD_NAMES.contains(&key.as_str()) {
                log::debug!("Ignoring Info key {:?} shadowing a metadata field", key);
                continue;
            }
            metadata.extra.entry(key).or_insert(value.into());
        }
    }
}

/// Text of a string or name object. UTF-16BE when the string starts with a
/// byte order mark, otherwise UTF-8 with a Latin-1 fallback.
pub fn object_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => {
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            } else {
                String::from_utf8(bytes.clone())
                    .ok()
                    .or_else(|| Some(bytes.iter().map(|&b| b as char).collect()))
            }
        }
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`).
///
/// Missing trailing fields default to their minimum; the offset, when
/// present, is applied before converting to UTC.
pub fn parse_pdf_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().strip_prefix("D:")?;

    // At minimum we need YYYY
    if s.len() < 4 {
        return None;
    }

    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        match s.get(range) {
            Some(v) if v.bytes().all(|b| b.is_ascii_digit()) => v.parse().ok(),
            Some(_) => None,
            None => Some(default),
        }
    };

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month = field(4..6, 1).unwrap_or(1);
    let day = field(6..8, 1).unwrap_or(1);
    let hour = field(8..10, 0).unwrap_or(0);
    let minute = field(10..12, 0).unwrap_or(0);
    let second = field(12..14, 0).unwrap_or(0);

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = s.get(14..).and_then(parse_offset).unwrap_or(0);
    let zone = FixedOffset::east_opt(offset)?;

    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Seconds east of UTC from `Z`, `+HH'mm'` or `-HH'mm'`.
fn parse_offset(tz: &str) -> Option<i32> {
    let mut chars = tz.chars();
    let sign = match chars.next()? {
        'Z' => return Some(0),
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let digits: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    Some(sign * (hours * 3600 + minutes * 60))
}
