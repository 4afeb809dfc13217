//! Shared PDF fixtures for integration tests.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use md5::{Digest, Md5};

pub const PAD_BYTES: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// A ruled 2x2 table with a heading above it.
pub const REPORT_PAGE: &[u8] = b"BT /F1 14 Tf 100 740 Td (Quarterly report) Tj ET \
    0.5 w \
    100 700 m 300 700 l S 100 680 m 300 680 l S 100 660 m 300 660 l S \
    100 660 m 100 700 l S 200 660 m 200 700 l S 300 660 m 300 700 l S \
    BT /F1 10 Tf 110 686 Td (Name) Tj ET BT /F1 10 Tf 210 686 Td (Age) Tj ET \
    BT /F1 10 Tf 110 666 Td (Alice) Tj ET BT /F1 10 Tf 210 666 Td (30) Tj ET";

pub fn text_page(text: &str) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text).into_bytes()
}

/// Build an unencrypted document and return it unsaved.
pub fn build_document(pages: Vec<Vec<u8>>) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for content in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Integration"),
        "Author" => Object::string_literal("pdfninja"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc
}

pub fn save(mut doc: Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn pdf_with_pages(pages: Vec<Vec<u8>>) -> Vec<u8> {
    save(build_document(pages))
}

pub fn rc4_transform(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: Vec<u8> = (0..=255).collect();
    let mut j: usize = 0;
    for i in 0..256 {
        j = (j + s[i] as usize + key[i % key.len()] as usize) & 0xFF;
        s.swap(i, j);
    }
    let mut out = Vec::with_capacity(data.len());
    let mut i: usize = 0;
    j = 0;
    for &byte in data {
        i = (i + 1) & 0xFF;
        j = (j + s[i] as usize) & 0xFF;
        s.swap(i, j);
        out.push(byte ^ s[(s[i] as usize + s[j] as usize) & 0xFF]);
    }
    out
}

/// One-page document encrypted with the standard handler, revision 2
/// (40-bit RC4). The owner password equals the user password.
pub fn encrypted_pdf(user_password: &[u8], content: &[u8]) -> Vec<u8> {
    let file_id = b"testfileid123456";
    let permissions: i32 = -4;

    let mut padded = Vec::with_capacity(32);
    let n = user_password.len().min(32);
    padded.extend_from_slice(&user_password[..n]);
    padded.extend_from_slice(&PAD_BYTES[..32 - n]);

    let owner_key = Md5::digest(&padded);
    let o_value = rc4_transform(&owner_key[..5], &padded);

    let mut hasher = Md5::new();
    hasher.update(&padded);
    hasher.update(&o_value);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    let file_key = hasher.finalize()[..5].to_vec();
    let u_value = rc4_transform(&file_key, &PAD_BYTES);

    let mut doc = build_document(vec![content.to_vec()]);
    let ids: Vec<ObjectId> = doc.objects.keys().copied().collect();
    for id in ids {
        let mut hasher = Md5::new();
        hasher.update(&file_key);
        hasher.update(&id.0.to_le_bytes()[..3]);
        hasher.update(&id.1.to_le_bytes()[..2]);
        let digest = hasher.finalize();
        let obj_key = &digest[..(file_key.len() + 5).min(16)];

        if let Some(obj) = doc.objects.get_mut(&id) {
            encrypt_object(obj_key, obj);
        }
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1_i64,
        "R" => 2_i64,
        "Length" => 40_i64,
        "O" => Object::String(o_value, StringFormat::Literal),
        "U" => Object::String(u_value, StringFormat::Literal),
        "P" => permissions as i64,
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(file_id.to_vec(), StringFormat::Literal),
            Object::String(file_id.to_vec(), StringFormat::Literal),
        ]),
    );
    save(doc)
}

fn encrypt_object(key: &[u8], obj: &mut Object) {
    match obj {
        Object::Stream(stream) => {
            let encrypted = rc4_transform(key, &stream.content);
            stream.set_content(encrypted);
        }
        Object::String(content, _) => *content = rc4_transform(key, content),
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                encrypt_object(key, value);
            }
        }
        _ => {}
    }
}
