use base64::{prelude::BASE64_STANDARD, Engine};
use md5::{Digest, Md5};

use super::crypto;
use crate::errors::{ExtractError, Result};

const SALTED_MAGIC: &[u8] = b"Salted__";

/// Decrypts a CryptoJS / OpenSSL passphrase envelope (`Salted__` + salt + ciphertext).
pub fn decrypt_salted_base64(password: &[u8], ct_base64: &str) -> Result<String> {
    let text = BASE64_STANDARD
        .decode(ct_base64.trim())
        .map_err(|e| ExtractError::decrypt(format!("invalid base64: {e}")))?;

    decrypt_salted(password, &text)
}

pub fn decrypt_salted(password: &[u8], text: &[u8]) -> Result<String> {
    if text.len() < 16 || &text[..8] != SALTED_MAGIC {
        return Err(ExtractError::decrypt("missing Salted__ header"));
    }

    decrypt_aes(password, &text[8..16], &text[16..])
}

pub fn decrypt_aes(password: &[u8], salt: &[u8], ct: &[u8]) -> Result<String> {
    let (key, iv) = derive_key_and_iv(password, salt);

    let pt = crypto::decrypt_aes(&key, &iv, ct)?;

    String::from_utf8(pt).map_err(ExtractError::decrypt)
}

/// OpenSSL `EVP_BytesToKey` with MD5, one iteration.
fn derive_key_and_iv(password: &[u8], salt: &[u8]) -> (Vec<u8>, Vec<u8>) {
    const KEY_LENGTH: usize = 32;
    const IV_LENGTH: usize = 16;
    const HASH_SIZE: usize = KEY_LENGTH + IV_LENGTH;
    const DIGIT_SIZE: usize = 16;

    let mut hash: [u8; HASH_SIZE] = [0; HASH_SIZE];
    let mut filled = 0;

    while filled < HASH_SIZE {
        let mut hasher = Md5::new();
        if filled > 0 {
            hasher.update(&hash[(filled - DIGIT_SIZE)..filled])
        }

        let out = hasher.chain_update(password).chain_update(salt).finalize();

        hash[filled..(filled + DIGIT_SIZE)].copy_from_slice(out.as_slice());

        filled += DIGIT_SIZE;
    }

    (hash[0..KEY_LENGTH].to_vec(), hash[KEY_LENGTH..].to_vec())
}

#[test]
fn should_derive_key_and_iv() {
    let salt = hex::decode("0f1e2d3c4b5a6978").unwrap();

    let (key, iv) = derive_key_and_iv(b"streamsb-passphrase", &salt);

    assert_eq!(
        hex::encode(key),
        "eccb13033b8668461c253dc13ecc337b3499830bd21cc8e894ba93c62a92aa74"
    );
    assert_eq!(hex::encode(iv), "f590368a2938a8347ca7691231ac0d5a");
}

#[test]
fn should_decrypt_raw_salted_bytes() {
    let envelope = hex::decode(concat!(
        "53616c7465645f5f0f1e2d3c4b5a6978528e1a22a636d452fe60bf9b4e6249ae",
        "3e856aedbbee148c9f4f26a3c59e119d8c1ee0b89b0fdf027e4f0fae2dc07eb1",
        "63cc27f043bcf546b0165791322a2b0033d35f0ec05f330fe0e8f9065411f27e",
        "e282e9351e5fa0119cdf8a9eb50dc47d",
    ))
    .unwrap();

    let res = decrypt_salted(b"streamsb-passphrase", &envelope).unwrap();

    assert_eq!(
        res,
        r#"{"sources":[{"file":"https://cdn.example.org/v/720/index.m3u8","label":"720p"}],"tracks":[]}"#
    );
}

#[test]
fn should_decrypt_salted_envelope() {
    const PASSWORD: &[u8] = b"93422192433952489752342908585752";
    const ENVELOPE: &str = "U2FsdGVkX18BAgMEBQYHCF/SHiP6sacQUuFb/4ZMP/tnfRYw9roDoRwa7BJCuvULb1M5z17Z1UC3vavQhPn8MDM9ausus6yfMBGyageczlK9/Qa7bRcbTOvhAyztms6lBjyfsGbuRlr+st0mWo/0Eg==";

    let res = decrypt_salted_base64(PASSWORD, ENVELOPE).unwrap();

    assert_eq!(
        res,
        r#"[{"file":"https://cdn.example.com/hls/master.m3u8","label":"Auto","type":"hls"}]"#
    );
}

#[test]
fn should_reject_unsalted_envelope() {
    let err = decrypt_salted(b"password", b"not salted at all").unwrap_err();
    assert!(matches!(err, ExtractError::DecryptFailed(_)));

    let err = decrypt_salted(b"password", b"Salted__").unwrap_err();
    assert!(matches!(err, ExtractError::DecryptFailed(_)));
}
