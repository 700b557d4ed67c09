//! Source payload decryption
//!
//! The player ships its `sources` as an OpenSSL/CryptoJS "salted" export:
//! base64 of `Salted__` + 8-byte salt + AES-256-CBC ciphertext, with key
//! and IV derived from a passphrase through `EVP_BytesToKey` (MD5, one
//! round). Payloads without the marker use SHA-256 of the passphrase as
//! key and a zero IV.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use sha2::Sha256;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::stream::descriptor::SourceRecord;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALTED_MAGIC: &[u8; 8] = b"Salted__";
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Decrypt an encrypted `sources` payload into source records.
///
/// The key is tried as raw bytes first, then hex-decoded; the first
/// passphrase whose plaintext is valid JSON wins.
pub fn decrypt_sources(payload: &str, key: &str) -> Result<Vec<SourceRecord>> {
    let data = STANDARD
        .decode(payload.trim())
        .map_err(|e| ResolveError::Decrypt(format!("invalid base64 payload: {e}")))?;

    let plaintext = candidate_passphrases(key)
        .into_iter()
        .enumerate()
        .find_map(|(candidate, passphrase)| {
            let plaintext = decrypt_json(&data, &passphrase);
            if plaintext.is_none() {
                debug!(candidate, "Passphrase candidate rejected");
            }
            plaintext
        })
        .ok_or_else(|| ResolveError::Decrypt("AES decryption failed".to_string()))?;

    serde_json::from_str(&plaintext)
        .map_err(|e| ResolveError::Decrypt(format!("decrypted payload is not a source list: {e}")))
}

/// Passphrases to try, in order: the key string itself, then its hex decoding.
fn candidate_passphrases(key: &str) -> Vec<Vec<u8>> {
    let mut candidates = vec![key.as_bytes().to_vec()];
    if let Ok(decoded) = hex::decode(key) {
        candidates.push(decoded);
    }
    candidates
}

/// Decrypt `data` with `passphrase`, keeping the result only if it is JSON.
fn decrypt_json(data: &[u8], passphrase: &[u8]) -> Option<String> {
    let (key, iv, ciphertext) = match data.strip_prefix(SALTED_MAGIC.as_slice()) {
        Some(rest) if rest.len() >= 8 => {
            let (salt, ciphertext) = rest.split_at(8);
            let (key, iv) = evp_bytes_to_key(passphrase, salt);
            (key, iv, ciphertext)
        }
        Some(_) => return None,
        None => {
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(&Sha256::digest(passphrase));
            (key, [0u8; IV_LEN], data)
        }
    };

    if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
        return None;
    }

    let mut buf = ciphertext.to_vec();
    let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
        .ok()?
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .ok()?;
    let text = std::str::from_utf8(plaintext).ok()?;

    serde_json::from_str::<serde_json::Value>(text).ok()?;
    Some(text.to_string())
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material = Vec::with_capacity(KEY_LEN + IV_LEN + 16);
    let mut previous: Vec<u8> = Vec::new();

    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    const SOURCES: &str = r#"[{"file":"https://cdn.example/hls/master.m3u8","type":"hls"}]"#;

    fn encrypt(plaintext: &[u8], key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Vec<u8> {
        let mut buf = vec![0u8; plaintext.len() + IV_LEN];
        buf[..plaintext.len()].copy_from_slice(plaintext);
        Aes256CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
            .unwrap()
            .to_vec()
    }

    /// Same layout `openssl enc -aes-256-cbc -md md5 -a` produces.
    fn salted_export(plaintext: &str, passphrase: &[u8], salt: [u8; 8]) -> String {
        let (key, iv) = evp_bytes_to_key(passphrase, &salt);
        let mut out = SALTED_MAGIC.to_vec();
        out.extend_from_slice(&salt);
        out.extend(encrypt(plaintext.as_bytes(), key, iv));
        STANDARD.encode(out)
    }

    #[test]
    fn evp_derivation_chains_md5_blocks() {
        let salt = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let (key, iv) = evp_bytes_to_key(b"password", &salt);

        let first = Md5::digest([b"password".as_slice(), salt.as_slice()].concat());
        let second = Md5::digest([first.as_slice(), b"password".as_slice(), salt.as_slice()].concat());
        let third = Md5::digest([second.as_slice(), b"password".as_slice(), salt.as_slice()].concat());

        assert_eq!(&key[..16], first.as_slice());
        assert_eq!(&key[16..], second.as_slice());
        assert_eq!(&iv[..], third.as_slice());
    }

    #[test]
    fn decrypts_salted_payload_with_raw_key() {
        let key = "k3yF0rTh3Pl4y3r-2025";
        let payload = salted_export(SOURCES, key.as_bytes(), *b"saltsalt");

        let sources = decrypt_sources(&payload, key).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].file, "https://cdn.example/hls/master.m3u8");
        assert_eq!(sources[0].kind.as_deref(), Some("hls"));
    }

    #[test]
    fn decrypts_salted_payload_with_hex_key() {
        let key = "6d656761636c6f75642d726f746174696e672d6b6579";
        let raw = hex::decode(key).unwrap();
        let payload = salted_export(SOURCES, &raw, [9, 8, 7, 6, 5, 4, 3, 2]);

        let sources = decrypt_sources(&payload, key).unwrap();
        assert_eq!(sources[0].file, "https://cdn.example/hls/master.m3u8");
    }

    #[test]
    fn decrypts_unsalted_payload() {
        let key = "legacy-key";
        let mut aes_key = [0u8; KEY_LEN];
        aes_key.copy_from_slice(&Sha256::digest(key.as_bytes()));
        let payload = STANDARD.encode(encrypt(SOURCES.as_bytes(), aes_key, [0u8; IV_LEN]));

        let sources = decrypt_sources(&payload, key).unwrap();
        assert_eq!(sources[0].file, "https://cdn.example/hls/master.m3u8");
    }

    #[test]
    fn wrong_key_fails() {
        let payload = salted_export(SOURCES, b"right-key", *b"12345678");
        let err = decrypt_sources(&payload, "wrong-key").unwrap_err();
        assert!(matches!(err, ResolveError::Decrypt(_)));
    }

    #[test]
    fn non_json_plaintext_is_rejected() {
        let payload = salted_export("definitely not json", b"key", *b"abcdefgh");
        assert!(decrypt_sources(&payload, "key").is_err());
    }

    #[test]
    fn json_that_is_not_a_list_fails() {
        let payload = salted_export(r#"{"file":"x"}"#, b"key", *b"abcdefgh");
        assert!(decrypt_sources(&payload, "key").is_err());
    }

    #[test]
    fn garbage_base64_fails() {
        assert!(decrypt_sources("%%%not-base64%%%", "key").is_err());
    }

    #[test]
    fn truncated_salt_header_fails() {
        let payload = STANDARD.encode(b"Salted__1234");
        assert!(decrypt_sources(&payload, "key").is_err());
    }
}
