//! Per-session authenticated encryption with AES-256-GCM

use aes_gcm::{
    Aes256Gcm, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use shared_protocol::Envelope;

use crate::{CryptoError, CryptoResult, IV_SIZE, SessionKey, TAG_SIZE};

/// Cipher bound to one session key.
///
/// Holds no counters: every `seal` draws its IV from the OS random source,
/// so concurrent use of the same session never repeats an IV.
pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    pub fn new(key: &SessionKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypt and authenticate `plaintext`.
    ///
    /// Returns: envelope with a fresh IV and [ciphertext][16-byte auth tag]
    pub fn seal(&self, plaintext: &[u8], aad: Option<&[u8]>) -> CryptoResult<Envelope> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), aad.unwrap_or_default(), &mut buffer)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        buffer.extend_from_slice(&tag);

        Ok(Envelope {
            iv,
            ciphertext: buffer,
            aad: aad.map(<[u8]>::to_vec),
        })
    }

    /// Verify and decrypt an envelope
    pub fn open(&self, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
        let len = envelope.ciphertext.len();
        if len < TAG_SIZE {
            return Err(CryptoError::MalformedInput(format!(
                "ciphertext is {} bytes, shorter than the {} byte tag",
                len, TAG_SIZE
            )));
        }

        let (body, tag) = envelope.ciphertext.split_at(len - TAG_SIZE);
        let mut buffer = body.to_vec();

        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&envelope.iv),
                envelope.aad.as_deref().unwrap_or_default(),
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| CryptoError::Authentication)?;

        Ok(buffer)
    }
}
