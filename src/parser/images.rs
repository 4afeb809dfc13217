//! Image XObject description.
//!
//! The content interpreter records where images are painted; this engine
//! looks up the image stream behind each placement and describes it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lopdf::{Object, Stream};

use crate::model::{BBox, ImageRef};
use crate::parser::options::ImageConfig;

use super::backend::{stream_bytes, LopdfBackend};
use super::content::ImagePlacement;

/// One painted image, in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub image: ImageRef,
    pub rect: BBox,
    pub bits_per_component: Option<u8>,
    pub color_space: Option<String>,
}

/// Describes image placements.
pub struct ImageEngine {
    config: ImageConfig,
}

impl ImageEngine {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Describe one placement. Placements whose stream cannot be found are
    /// still reported, with an unknown type.
    pub fn describe(&self, backend: &LopdfBackend, placement: &ImagePlacement) -> PlacedImage {
        let stream = placement
            .object_id
            .and_then(|id| backend.raw_doc().get_object(id).ok())
            .and_then(|obj| match obj {
                Object::Stream(s) => Some(s),
                _ => None,
            });

        match stream {
            Some(stream) => self.describe_stream(&placement.name, stream, placement.rect),
            None => PlacedImage {
                image: ImageRef {
                    name: placement.name.clone(),
                    width: None,
                    height: None,
                    mime_type: OCTET_STREAM.to_string(),
                    data: None,
                },
                rect: placement.rect,
                bits_per_component: None,
                color_space: None,
            },
        }
    }

    fn describe_stream(&self, name: &str, stream: &Stream, rect: BBox) -> PlacedImage {
        let dict = &stream.dict;
        let int = |key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|o| o.as_i64().ok())
                .and_then(|v| u32::try_from(v).ok())
        };

        let filter = last_filter(dict.get(b"Filter").ok());
        let (mime_type, passthrough) = match filter.as_deref() {
            Some("DCTDecode") => ("image/jpeg", true),
            Some("JPXDecode") => ("image/jp2", true),
            _ => (OCTET_STREAM, false),
        };

        // JPEG and JPEG 2000 bytes are usable files as stored; everything
        // else is decoded sample data.
        let data = self.config.embed_data.then(|| {
            let bytes = if passthrough {
                stream.content.clone()
            } else {
                stream_bytes(stream)
            };
            STANDARD.encode(bytes)
        });

        let color_space = dict.get(b"ColorSpace").ok().and_then(|cs| match cs {
            Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
            Object::Array(arr) => arr
                .first()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned()),
            _ => None,
        });

        PlacedImage {
            image: ImageRef {
                name: name.to_string(),
                width: int(b"Width"),
                height: int(b"Height"),
                mime_type: mime_type.to_string(),
                data,
            },
            rect,
            bits_per_component: int(b"BitsPerComponent").and_then(|b| u8::try_from(b).ok()),
            color_space,
        }
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

/// The filter applied last when decoding, which decides the stored format.
fn last_filter(filter: Option<&Object>) -> Option<String> {
    let name = match filter? {
        Object::Name(n) => n.as_slice(),
        Object::Array(arr) => arr.last()?.as_name().ok()?,
        _ => return None,
    };
    Some(String::from_utf8_lossy(name).into_owned())
}
