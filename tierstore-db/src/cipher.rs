//! Value encryption for partitions opened with a key.
//!
//! Each value is sealed with XChaCha20-Poly1305. The 256-bit cipher key is
//! derived with HKDF-SHA256 from the partition key material, using the
//! partition name as `info`, so the same key material yields unrelated cipher
//! keys for different partitions. The entry key is bound as associated data,
//! which makes a value copied under another key fail to open.
//!
//! Stored form: `base64(nonce || ciphertext)`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::engine::KvEngine;
use crate::error::{DbError, DbResult};

const NONCE_SIZE: usize = 24;
const KEY_SALT: &[u8] = b"tierstore:kv-cipher:salt";

/// Engine wrapper that encrypts values before handing them to `inner`.
///
/// Keys are stored in the clear so that listing and prefix scans keep working.
pub struct EncryptedEngine {
    inner: Arc<dyn KvEngine>,
    cipher: XChaCha20Poly1305,
}

impl std::fmt::Debug for EncryptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedEngine").finish_non_exhaustive()
    }
}

impl EncryptedEngine {
    /// Wraps `inner`, deriving the cipher key for `partition` from `key`.
    ///
    /// # Errors
    ///
    /// Returns a cipher error if key derivation fails.
    pub fn new(
        inner: Arc<dyn KvEngine>,
        key: &SecretString,
        partition: &str,
    ) -> DbResult<Self> {
        let cipher = derive_cipher(key, partition)?;
        Ok(Self { inner, cipher })
    }

    fn seal(&self, key: &str, plaintext: &str) -> DbResult<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::fill(&mut nonce)
            .map_err(|err| DbError::cipher(format!("nonce generation failed: {err}")))?;
        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|err| DbError::cipher(format!("seal failed: {err}")))?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn open(&self, key: &str, sealed: &str) -> DbResult<String> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|err| DbError::cipher(format!("sealed value is not base64: {err}")))?;
        if bytes.len() < NONCE_SIZE {
            return Err(DbError::cipher("sealed value too short"));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|err| DbError::cipher(format!("open failed: {err}")))?;
        String::from_utf8(plaintext)
            .map_err(|err| DbError::cipher(format!("decrypted value is not utf-8: {err}")))
    }
}

impl KvEngine for EncryptedEngine {
    fn get_string(&self, key: &str) -> DbResult<Option<String>> {
        self.inner
            .get_string(key)?
            .map(|sealed| self.open(key, &sealed))
            .transpose()
    }

    fn set_string(&self, key: &str, value: &str) -> DbResult<()> {
        let sealed = self.seal(key, value)?;
        self.inner.set_string(key, &sealed)
    }

    fn delete(&self, key: &str) -> DbResult<()> {
        self.inner.delete(key)
    }

    fn clear_all(&self) -> DbResult<()> {
        self.inner.clear_all()
    }

    fn all_keys(&self) -> DbResult<Vec<String>> {
        self.inner.all_keys()
    }

    fn contains(&self, key: &str) -> DbResult<bool> {
        self.inner.contains(key)
    }

    fn stored_size(&self, key: &str) -> DbResult<Option<u64>> {
        self.inner.stored_size(key)
    }
}

fn derive_cipher(key: &SecretString, partition: &str) -> DbResult<XChaCha20Poly1305> {
    let hkdf = Hkdf::<Sha256>::new(Some(KEY_SALT), key.expose_secret().as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(partition.as_bytes(), okm.as_mut_slice())
        .map_err(|err| DbError::cipher(format!("key derivation failed: {err}")))?;
    Ok(XChaCha20Poly1305::new(Key::from_slice(okm.as_slice())))
}
