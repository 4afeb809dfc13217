//! Standard security handler (revisions 2 to 4).
//!
//! Authenticates a user or owner password against the `/Encrypt`
//! dictionary, derives the file key and decrypts every string and stream of
//! the document in place. RC4 and AESV2 crypt methods are supported; the
//! AES-256 revisions 5 and 6 are reported as unsupported.

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use md5::{Digest, Md5};

use crate::error::OpenError;

/// Password padding string from the PDF reference.
const PAD_BYTES: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Which password opened the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordKind {
    User,
    Owner,
}

impl PasswordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PasswordKind::User => "user",
            PasswordKind::Owner => "owner",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CryptMethod {
    Rc4,
    Aes128,
}

/// Parameters of a standard `/Encrypt` dictionary.
#[derive(Debug, Clone)]
struct SecurityHandler {
    revision: i64,
    key_len: usize,
    owner: Vec<u8>,
    user: Vec<u8>,
    permissions: i32,
    file_id: Vec<u8>,
    encrypt_metadata: bool,
    method: CryptMethod,
}

/// Check whether the document carries an `/Encrypt` entry.
pub fn is_encrypted(doc: &LopdfDocument) -> bool {
    doc.trailer.get(b"Encrypt").is_ok()
}

/// Decrypt `doc` in place.
///
/// The supplied password is tried as user then owner password, then the
/// empty password. On success the
/// `/Encrypt` entry is removed from the trailer.
pub fn decrypt(doc: &mut LopdfDocument, password: Option<&str>) -> Result<PasswordKind, OpenError> {
    let (handler, encrypt_id) = SecurityHandler::from_document(doc)?;

    let supplied = password.and_then(|p| handler.authenticate(p.as_bytes()));
    let (key, kind) = match supplied.or_else(|| handler.authenticate(b"")) {
        Some(found) => found,
        None if password.is_none() => return Err(OpenError::Encrypted),
        None => return Err(OpenError::InvalidPassword),
    };
    log::debug!(
        "Authenticated {} password (R{}, {:?})",
        kind.as_str(),
        handler.revision,
        handler.method
    );

    let ids: Vec<ObjectId> = doc.objects.keys().copied().collect();
    for id in ids {
        if Some(id) == encrypt_id {
            continue;
        }
        if let Some(obj) = doc.objects.get_mut(&id) {
            handler.decrypt_object(&key, id, obj)?;
        }
    }
    doc.trailer.remove(b"Encrypt");

    Ok(kind)
}

impl SecurityHandler {
    fn from_document(doc: &LopdfDocument) -> Result<(Self, Option<ObjectId>), OpenError> {
        let entry = doc
            .trailer
            .get(b"Encrypt")
            .map_err(|_| OpenError::Malformed("missing /Encrypt".to_string()))?;
        let (dict, encrypt_id) = match entry {
            Object::Reference(id) => (
                doc.get_dictionary(*id)
                    .map_err(|e| OpenError::Malformed(e.to_string()))?,
                Some(*id),
            ),
            Object::Dictionary(d) => (d, None),
            _ => return Err(OpenError::Malformed("invalid /Encrypt".to_string())),
        };

        let filter = dict.get(b"Filter").and_then(|f| f.as_name()).unwrap_or(b"");
        if filter != b"Standard" {
            return Err(OpenError::UnsupportedEncryption(format!(
                "security handler {}",
                String::from_utf8_lossy(filter)
            )));
        }

        let version = get_int(dict, b"V").unwrap_or(0);
        let revision = get_int(dict, b"R").unwrap_or(0);
        if !(2..=4).contains(&revision) {
            return Err(OpenError::UnsupportedEncryption(format!("revision {}", revision)));
        }

        let (method, key_bits) = if version == 4 {
            crypt_filter_method(dict)?
        } else {
            (CryptMethod::Rc4, get_int(dict, b"Length").unwrap_or(40))
        };
        let key_len = if revision == 2 {
            5
        } else {
            (key_bits / 8).clamp(5, 16) as usize
        };

        let file_id = doc
            .trailer
            .get(b"ID")
            .and_then(|o| o.as_array())
            .ok()
            .and_then(|a| a.first())
            .and_then(|o| o.as_str().ok())
            .map(|s| s.to_vec())
            .unwrap_or_default();

        let handler = SecurityHandler {
            revision,
            key_len,
            owner: get_bytes(dict, b"O")?,
            user: get_bytes(dict, b"U")?,
            permissions: get_int(dict, b"P").unwrap_or(-1) as i32,
            file_id,
            encrypt_metadata: dict
                .get(b"EncryptMetadata")
                .and_then(|o| o.as_bool())
                .unwrap_or(true),
            method,
        };
        Ok((handler, encrypt_id))
    }

    /// Try `password` as user password, then as owner password.
    fn authenticate(&self, password: &[u8]) -> Option<(Vec<u8>, PasswordKind)> {
        let padded = pad_password(password);
        if let Some(key) = self.check_user(&padded) {
            return Some((key, PasswordKind::User));
        }
        let user_padded = self.recover_user_password(&padded);
        self.check_user(&user_padded)
            .map(|key| (key, PasswordKind::Owner))
    }

    /// Compute the file key from a padded user password.
    fn file_key(&self, padded: &[u8; 32]) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(padded);
        hasher.update(&self.owner[..self.owner.len().min(32)]);
        hasher.update(self.permissions.to_le_bytes());
        hasher.update(&self.file_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            hasher.update([0xFF; 4]);
        }
        let mut hash = hasher.finalize().to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = Md5::digest(&hash[..self.key_len]).to_vec();
            }
        }
        hash.truncate(self.key_len);
        hash
    }

    /// Return the file key when `padded` is the user password.
    fn check_user(&self, padded: &[u8; 32]) -> Option<Vec<u8>> {
        let key = self.file_key(padded);
        let matches = if self.revision == 2 {
            let mut expected = PAD_BYTES.to_vec();
            rc4_apply(&key, &mut expected).ok()?;
            self.user.len() >= 32 && expected[..] == self.user[..32]
        } else {
            let mut hasher = Md5::new();
            hasher.update(PAD_BYTES);
            hasher.update(&self.file_id);
            let mut expected = hasher.finalize().to_vec();
            rc4_apply(&key, &mut expected).ok()?;
            for i in 1..=19u8 {
                let round: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                rc4_apply(&round, &mut expected).ok()?;
            }
            self.user.len() >= 16 && expected[..16] == self.user[..16]
        };
        matches.then_some(key)
    }

    /// Decrypt `/O` with a key derived from the owner password, giving the
    /// padded user password.
    fn recover_user_password(&self, owner_padded: &[u8; 32]) -> [u8; 32] {
        let mut hash = Md5::digest(owner_padded).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = Md5::digest(&hash).to_vec();
            }
        }
        let key = &hash[..self.key_len];

        let mut data = self.owner[..self.owner.len().min(32)].to_vec();
        if self.revision == 2 {
            let _ = rc4_apply(key, &mut data);
        } else {
            for i in (0..=19u8).rev() {
                let round: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                let _ = rc4_apply(&round, &mut data);
            }
        }

        let mut out = PAD_BYTES;
        let n = data.len().min(32);
        out[..n].copy_from_slice(&data[..n]);
        out
    }

    fn object_key(&self, key: &[u8], id: ObjectId) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(key);
        hasher.update(&id.0.to_le_bytes()[..3]);
        hasher.update(&id.1.to_le_bytes()[..2]);
        if self.method == CryptMethod::Aes128 {
            hasher.update(b"sAlT");
        }
        let mut hash = hasher.finalize().to_vec();
        hash.truncate((key.len() + 5).min(16));
        hash
    }

    fn decrypt_object(&self, key: &[u8], id: ObjectId, obj: &mut Object) -> Result<(), OpenError> {
        let obj_key = self.object_key(key, id);
        match obj {
            Object::Stream(stream) => {
                let kind = stream.dict.get(b"Type").and_then(|t| t.as_name()).ok();
                if kind == Some(b"XRef".as_slice()) {
                    return Ok(());
                }
                if kind == Some(b"Metadata".as_slice()) && !self.encrypt_metadata {
                    return Ok(());
                }
                self.decrypt_strings(&obj_key, &mut stream.dict)?;
                let plain = self.decrypt_bytes(&obj_key, &stream.content)?;
                stream.set_content(plain);
            }
            other => self.decrypt_value(&obj_key, other)?,
        }
        Ok(())
    }

    fn decrypt_strings(&self, obj_key: &[u8], dict: &mut Dictionary) -> Result<(), OpenError> {
        for (_, value) in dict.iter_mut() {
            self.decrypt_value(obj_key, value)?;
        }
        Ok(())
    }

    fn decrypt_value(&self, obj_key: &[u8], obj: &mut Object) -> Result<(), OpenError> {
        match obj {
            Object::String(bytes, _) => {
                *bytes = self.decrypt_bytes(obj_key, bytes)?;
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.decrypt_value(obj_key, item)?;
                }
            }
            Object::Dictionary(dict) => self.decrypt_strings(obj_key, dict)?,
            _ => {}
        }
        Ok(())
    }

    fn decrypt_bytes(&self, obj_key: &[u8], data: &[u8]) -> Result<Vec<u8>, OpenError> {
        match self.method {
            CryptMethod::Rc4 => {
                let mut out = data.to_vec();
                rc4_apply(obj_key, &mut out)?;
                Ok(out)
            }
            CryptMethod::Aes128 => aes_cbc_decrypt(obj_key, data),
        }
    }
}

/// Read the default crypt filter of a V4 dictionary.
fn crypt_filter_method(dict: &Dictionary) -> Result<(CryptMethod, i64), OpenError> {
    let stream_filter = dict.get(b"StmF").and_then(|o| o.as_name()).unwrap_or(b"Identity");
    if stream_filter == b"Identity" {
        return Ok((CryptMethod::Rc4, 128));
    }
    let filter = dict
        .get(b"CF")
        .and_then(|cf| cf.as_dict())
        .and_then(|cf| cf.get(stream_filter))
        .and_then(|f| f.as_dict())
        .map_err(|_| OpenError::Malformed("missing crypt filter".to_string()))?;

    let method = match filter.get(b"CFM").and_then(|m| m.as_name()).unwrap_or(b"None") {
        b"V2" => CryptMethod::Rc4,
        b"AESV2" => CryptMethod::Aes128,
        other => {
            return Err(OpenError::UnsupportedEncryption(format!(
                "crypt method {}",
                String::from_utf8_lossy(other)
            )))
        }
    };
    // Length in a crypt filter is given in bytes by most producers.
    let length = match get_int(filter, b"Length") {
        Some(n) if n <= 16 => n * 8,
        Some(n) => n,
        None => 128,
    };
    Ok((method, length))
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = PAD_BYTES;
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PAD_BYTES[..32 - n]);
    out
}

fn get_int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).and_then(|o| o.as_i64()).ok()
}

fn get_bytes(dict: &Dictionary, key: &[u8]) -> Result<Vec<u8>, OpenError> {
    dict.get(key)
        .and_then(|o| o.as_str())
        .map(|s| s.to_vec())
        .map_err(|_| {
            OpenError::Malformed(format!("missing /{} in /Encrypt", String::from_utf8_lossy(key)))
        })
}

/// RC4 keystream over `data`, in place. PDF keys are 5 to 16 bytes.
pub(crate) fn rc4_apply(key: &[u8], data: &mut [u8]) -> Result<(), OpenError> {
    use rc4::consts::{U10, U11, U12, U13, U14, U15, U16, U5, U6, U7, U8, U9};
    use rc4::{KeyInit, Rc4, StreamCipher};

    macro_rules! apply {
        ($size:ty) => {{
            let mut cipher = Rc4::<$size>::new_from_slice(key)
                .map_err(|_| OpenError::UnsupportedEncryption("invalid RC4 key".to_string()))?;
            cipher.apply_keystream(data);
        }};
    }

    match key.len() {
        5 => apply!(U5),
        6 => apply!(U6),
        7 => apply!(U7),
        8 => apply!(U8),
        9 => apply!(U9),
        10 => apply!(U10),
        11 => apply!(U11),
        12 => apply!(U12),
        13 => apply!(U13),
        14 => apply!(U14),
        15 => apply!(U15),
        16 => apply!(U16),
        n => {
            return Err(OpenError::UnsupportedEncryption(format!(
                "RC4 key length {}",
                n
            )))
        }
    }
    Ok(())
}

/// AES-128-CBC with the IV in the first block and PKCS#7 padding.
fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, OpenError> {
    use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};

    if data.len() < 16 {
        // Empty strings are stored as a bare IV or nothing at all.
        return Ok(Vec::new());
    }
    let (iv, body) = data.split_at(16);
    let decryptor = cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
        .map_err(|_| OpenError::UnsupportedEncryption("invalid AES key".to_string()))?;
    let mut buf = body.to_vec();
    let plain = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| OpenError::Malformed("bad AES padding".to_string()))?;
    Ok(plain.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_password() {
        assert_eq!(pad_password(b""), PAD_BYTES);
        let padded = pad_password(b"abc");
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..], &PAD_BYTES[..29]);
    }

    #[test]
    fn test_rc4_is_symmetric() {
        let key = b"Key01";
        let mut data = b"Plaintext".to_vec();
        rc4_apply(key, &mut data).unwrap();
        assert_ne!(data, b"Plaintext");
        rc4_apply(key, &mut data).unwrap();
        assert_eq!(data, b"Plaintext");
    }

    #[test]
    fn test_rc4_known_vector() {
        let mut data = b"Attack at dawn".to_vec();
        rc4_apply(b"Secret", &mut data).unwrap();
        assert_eq!(
            data,
            [0x45, 0xA0, 0x1F, 0x64, 0x5F, 0xC3, 0x5B, 0x38, 0x35, 0x52, 0x54, 0x4B, 0x9B, 0xF5]
        );
    }

    #[test]
    fn test_rc4_rejects_long_keys() {
        let mut data = vec![0u8; 4];
        assert!(rc4_apply(&[0u8; 17], &mut data).is_err());
    }

    #[test]
    fn test_short_aes_payload_is_empty() {
        assert_eq!(aes_cbc_decrypt(&[0u8; 16], &[1, 2, 3]).unwrap(), Vec::<u8>::new());
    }
}
