use base64::{prelude::BASE64_STANDARD, Engine};
use cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::errors::{ExtractError, Result};

const BLOCK_SIZE: usize = 16;

macro_rules! cbc_decrypt {
    ($cipher:ty, $key:expr, $iv:expr, $ct:expr) => {
        cbc::Decryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|e| ExtractError::decrypt(format!("invalid key or iv: {e}")))?
            .decrypt_padded_vec_mut::<Pkcs7>($ct)
            .map_err(|e| ExtractError::decrypt(format!("bad padding: {e}")))
    };
}

macro_rules! cbc_encrypt {
    ($cipher:ty, $key:expr, $iv:expr, $pt:expr) => {
        cbc::Encryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|e| ExtractError::decrypt(format!("invalid key or iv: {e}")))?
            .encrypt_padded_vec_mut::<Pkcs7>($pt)
    };
}

pub fn decrypt_base64_aes(key: &[u8], iv: &[u8], ct_base64: &[u8]) -> Result<Vec<u8>> {
    let ct = BASE64_STANDARD
        .decode(ct_base64)
        .map_err(|e| ExtractError::decrypt(format!("invalid base64: {e}")))?;
    decrypt_aes(key, iv, &ct)
}

/// AES-CBC with PKCS#7 padding; the key length picks AES-128/192/256.
pub fn decrypt_aes(key: &[u8], iv: &[u8], ct: &[u8]) -> Result<Vec<u8>> {
    if ct.is_empty() || ct.len() % BLOCK_SIZE != 0 {
        return Err(ExtractError::decrypt(format!(
            "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            ct.len()
        )));
    }

    match key.len() {
        16 => cbc_decrypt!(aes::Aes128, key, iv, ct),
        24 => cbc_decrypt!(aes::Aes192, key, iv, ct),
        32 => cbc_decrypt!(aes::Aes256, key, iv, ct),
        n => Err(ExtractError::decrypt(format!("unsupported key length {n}"))),
    }
}

pub fn encrypt_aes(key: &[u8], iv: &[u8], pt: &[u8]) -> Result<Vec<u8>> {
    let ct = match key.len() {
        16 => cbc_encrypt!(aes::Aes128, key, iv, pt),
        24 => cbc_encrypt!(aes::Aes192, key, iv, pt),
        32 => cbc_encrypt!(aes::Aes256, key, iv, pt),
        n => return Err(ExtractError::decrypt(format!("unsupported key length {n}"))),
    };

    Ok(ct)
}

pub fn encrypt_base64_aes(key: &[u8], iv: &[u8], pt: &[u8]) -> Result<String> {
    encrypt_aes(key, iv, pt).map(|ct| BASE64_STANDARD.encode(ct))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IV: &[u8] = b"9262859232435825";

    #[test]
    fn should_round_trip_all_key_sizes() {
        let plaintexts = ["", "a", "{\"source\":[]}", "exactly sixteen!", "юнікод ✓ 字幕"];

        for key in [
            &b"kiemtienmua911ca"[..],
            &b"0123456789abcdefghijklmn"[..],
            &b"93422192433952489752342908585752"[..],
        ] {
            for pt in plaintexts {
                let ct = encrypt_aes(key, IV, pt.as_bytes()).unwrap();
                assert_eq!(ct.len() % BLOCK_SIZE, 0);
                assert_eq!(decrypt_aes(key, IV, &ct).unwrap(), pt.as_bytes());
            }
        }
    }

    #[test]
    fn should_reject_invalid_length() {
        let key = b"kiemtienmua911ca";
        let ct = encrypt_aes(key, IV, b"some plaintext").unwrap();

        let err = decrypt_aes(key, IV, &ct[..15]).unwrap_err();
        assert!(matches!(err, ExtractError::DecryptFailed(_)));

        let err = decrypt_aes(key, IV, &[]).unwrap_err();
        assert!(matches!(err, ExtractError::DecryptFailed(_)));
    }

    #[test]
    fn should_reject_wrong_key() {
        let ct =
            encrypt_aes(b"kiemtienmua911ca", IV, b"{\"file\":\"https://host/a.m3u8\"}").unwrap();
        let res = decrypt_aes(b"another_key_1234", IV, &ct);

        // a wrong key decrypts to noise, which almost never carries valid padding
        if let Ok(pt) = res {
            assert_ne!(pt, b"{\"file\":\"https://host/a.m3u8\"}");
        }
    }

    #[test]
    fn should_reject_bad_key_and_iv_sizes() {
        assert!(matches!(
            encrypt_aes(b"short", IV, b"x"),
            Err(ExtractError::DecryptFailed(_))
        ));
        assert!(matches!(
            encrypt_aes(b"kiemtienmua911ca", b"short", b"x"),
            Err(ExtractError::DecryptFailed(_))
        ));
    }

    #[test]
    fn should_reject_invalid_base64() {
        assert!(matches!(
            decrypt_base64_aes(b"kiemtienmua911ca", IV, b"%%%"),
            Err(ExtractError::DecryptFailed(_))
        ));
    }
}
