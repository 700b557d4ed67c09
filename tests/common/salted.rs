//! OpenSSL salted-export encryptor shared by the integration tests and the
//! benches.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};

/// `openssl enc -aes-256-cbc -md md5 -a` equivalent.
pub fn salted_export(plaintext: &str, passphrase: &[u8], salt: [u8; 8]) -> String {
    let mut material = Vec::new();
    let mut previous: Vec<u8> = Vec::new();
    while material.len() < 48 {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut buf = vec![0u8; plaintext.len() + 16];
    buf[..plaintext.len()].copy_from_slice(plaintext.as_bytes());
    let ciphertext = cbc::Encryptor::<aes::Aes256>::new_from_slices(&material[..32], &material[32..48])
        .unwrap()
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .unwrap()
        .to_vec();

    let mut out = b"Salted__".to_vec();
    out.extend_from_slice(&salt);
    out.extend(ciphertext);
    STANDARD.encode(out)
}
