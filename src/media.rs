//! Media upload/download envelope: key derivation, CBC encryption, and
//! the HMAC sidecar that protects ciphertext integrity.
//!
//! WhatsApp media is encrypted with a per-file random key expanded via
//! HKDF-SHA256 into four 28-byte fields: IV, cipher key, MAC key, and
//! a ref key used for re-upload. The engine never retries a failed MAC
//! check — a mismatch is a fatal, fail-closed `MediaError`.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::crypto::Hkdf;
use crate::error::MediaError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const MAC_LEN: usize = 10;
const SIDECAR_BLOCK: usize = 80;

/// Media-type strings WhatsApp uses as the HKDF `info` parameter so
/// the same raw key produces different derived keys per media kind.
pub mod media_type {
    pub const IMAGE: &[u8] = b"WhatsApp Image Keys";
    pub const VIDEO: &[u8] = b"WhatsApp Video Keys";
    pub const AUDIO: &[u8] = b"WhatsApp Audio Keys";
    pub const DOCUMENT: &[u8] = b"WhatsApp Document Keys";
}

/// The four keys derived from a media key via HKDF-SHA256.
pub struct MediaKeys {
    pub iv: [u8; 16],
    pub cipher_key: [u8; 32],
    pub mac_key: [u8; 32],
    pub ref_key: [u8; 32],
}

impl MediaKeys {
    /// Expand a 32-byte media key into iv/cipherKey/macKey/refKey.
    pub fn derive(media_key: &[u8; 32], info: &[u8]) -> Self {
        let expanded = Hkdf::derive(None, media_key, info, 112);
        let mut iv = [0u8; 16];
        let mut cipher_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        let mut ref_key = [0u8; 32];
        iv.copy_from_slice(&expanded[0..16]);
        cipher_key.copy_from_slice(&expanded[16..48]);
        mac_key.copy_from_slice(&expanded[48..80]);
        ref_key.copy_from_slice(&expanded[80..112]);
        Self { iv, cipher_key, mac_key, ref_key }
    }
}

/// Encrypt `plaintext` for upload: AES-256-CBC+PKCS7 followed by a
/// truncated HMAC-SHA256 over IV||ciphertext, appended to the
/// returned buffer. Also returns the per-80-byte-block sidecar MACs
/// used for streaming integrity checks during download.
pub fn encrypt_media(media_key: &[u8; 32], info: &[u8], plaintext: &[u8]) -> (Vec<u8>, Vec<[u8; MAC_LEN]>) {
    let keys = MediaKeys::derive(media_key, info);
    let ciphertext = Aes256CbcEnc::new(&keys.cipher_key.into(), &keys.iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mac = compute_mac(&keys.mac_key, &keys.iv, &ciphertext);
    let sidecar = compute_sidecar(&keys.mac_key, &keys.iv, &ciphertext);

    let mut out = ciphertext;
    out.extend_from_slice(&mac);
    (out, sidecar)
}

/// Decrypt and verify a downloaded media blob. `ciphertext_with_mac`
/// is the ciphertext with the trailing 10-byte MAC still attached, as
/// downloaded from the CDN. Fails closed: any MAC mismatch is
/// `MediaError::MacMismatch`, no retry.
pub fn decrypt_media(
    media_key: &[u8; 32],
    info: &[u8],
    ciphertext_with_mac: &[u8],
) -> Result<Vec<u8>, MediaError> {
    if ciphertext_with_mac.len() < MAC_LEN {
        return Err(MediaError::InvalidLength);
    }
    let (ciphertext, received_mac) =
        ciphertext_with_mac.split_at(ciphertext_with_mac.len() - MAC_LEN);

    let keys = MediaKeys::derive(media_key, info);
    let expected_mac = compute_mac(&keys.mac_key, &keys.iv, ciphertext);

    if expected_mac.ct_eq(received_mac).unwrap_u8() != 1 {
        return Err(MediaError::MacMismatch);
    }

    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(MediaError::InvalidLength);
    }

    Aes256CbcDec::new(&keys.cipher_key.into(), &keys.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| MediaError::InvalidPadding)
}

fn compute_mac(mac_key: &[u8; 32], iv: &[u8; 16], ciphertext: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);
    let full: [u8; 32] = mac.finalize().into_bytes().into();
    let mut truncated = [0u8; MAC_LEN];
    truncated.copy_from_slice(&full[..MAC_LEN]);
    truncated
}

/// Per-80-byte-block running MACs, allowing a streaming downloader to
/// verify integrity incrementally rather than buffering the whole
/// file before the final MAC check.
fn compute_sidecar(mac_key: &[u8; 32], iv: &[u8; 16], ciphertext: &[u8]) -> Vec<[u8; MAC_LEN]> {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(iv);

    let mut sidecar = Vec::new();
    for chunk in ciphertext.chunks(SIDECAR_BLOCK) {
        mac.update(chunk);
        let digest: [u8; 32] = mac.clone().finalize().into_bytes().into();
        let mut truncated = [0u8; MAC_LEN];
        truncated.copy_from_slice(&digest[..MAC_LEN]);
        sidecar.push(truncated);
    }
    sidecar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let media_key = [7u8; 32];
        let plaintext = b"a reasonably sized media payload that spans more than one AES block";

        let (encrypted, _sidecar) = encrypt_media(&media_key, media_type::IMAGE, plaintext);
        let decrypted = decrypt_media(&media_key, media_type::IMAGE, &encrypted).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let media_key = [7u8; 32];
        let wrong_key = [8u8; 32];
        let (encrypted, _) = encrypt_media(&media_key, media_type::VIDEO, b"payload");

        let result = decrypt_media(&wrong_key, media_type::VIDEO, &encrypted);
        assert!(matches!(result, Err(MediaError::MacMismatch)));
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let media_key = [3u8; 32];
        let (mut encrypted, _) = encrypt_media(&media_key, media_type::DOCUMENT, b"important file contents");
        let mid = encrypted.len() / 2;
        encrypted[mid] ^= 0xFF;

        let result = decrypt_media(&media_key, media_type::DOCUMENT, &encrypted);
        assert!(matches!(result, Err(MediaError::MacMismatch)));
    }

    #[test]
    fn test_sidecar_covers_every_block() {
        let media_key = [1u8; 32];
        let plaintext = vec![0x42u8; SIDECAR_BLOCK * 3 + 5];
        let (_encrypted, sidecar) = encrypt_media(&media_key, media_type::AUDIO, &plaintext);
        // ciphertext length is plaintext rounded up to a block boundary plus one padding block
        assert!(!sidecar.is_empty());
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let media_key = [9u8; 32];
        let result = decrypt_media(&media_key, media_type::IMAGE, &[0u8; 4]);
        assert!(matches!(result, Err(MediaError::InvalidLength)));
    }
}
