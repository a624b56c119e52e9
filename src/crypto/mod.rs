//! Symmetric encryption primitives behind the password protocol.
//!
//! The protocol in [`password`] only talks to the [`PasswordCipher`] trait.
//! [`AesGcmCipher`] is the production implementation: AES-256-GCM from
//! `ring` with a fresh 96-bit nonce per message, used as the IV, and standard
//! base64 text framing for both IV and ciphertext.

pub mod password;

use crate::config::types::CryptoError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Size of a single-use password key (256 bits)
pub const PASSWORD_KEY_LEN: usize = 32;

/// Base64 IV and ciphertext produced by one encryption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedText {
    pub iv: String,
    pub ciphertext: String,
}

/// Random source and cipher used by the password protocol
pub trait PasswordCipher {
    /// Fresh random key of `PASSWORD_KEY_LEN` bytes
    fn generate_key(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Encrypt `plaintext` under `key`, returning base64 IV and ciphertext
    fn encrypt_as_base64(&self, plaintext: &[u8], key: &[u8]) -> Result<EncryptedText, CryptoError>;

    /// Inverse of `encrypt_as_base64`
    fn decrypt_base64(
        &self,
        ciphertext: &str,
        key: &[u8],
        iv: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;
}

/// AES-256-GCM over the system CSPRNG
pub struct AesGcmCipher {
    rng: SystemRandom,
}

impl AesGcmCipher {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    fn sealing_key(key: &[u8]) -> Result<LessSafeKey, CryptoError> {
        if key.len() != AES_256_GCM.key_len() {
            return Err(CryptoError::KeyLength {
                expected: AES_256_GCM.key_len(),
                actual: key.len(),
            });
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key)?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl Default for AesGcmCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordCipher for AesGcmCipher {
    fn generate_key(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        random_bytes(&self.rng, PASSWORD_KEY_LEN)
    }

    fn encrypt_as_base64(&self, plaintext: &[u8], key: &[u8]) -> Result<EncryptedText, CryptoError> {
        let sealing_key = Self::sealing_key(key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Random)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = Zeroizing::new(plaintext.to_vec());
        sealing_key.seal_in_place_append_tag(nonce, Aad::empty(), &mut *in_out)?;

        Ok(EncryptedText {
            iv: base64_encode(&nonce_bytes),
            ciphertext: base64_encode(&in_out),
        })
    }

    fn decrypt_base64(
        &self,
        ciphertext: &str,
        key: &[u8],
        iv: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let opening_key = Self::sealing_key(key)?;
        let nonce_bytes = base64_decode(iv)?;
        let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)?;

        let mut in_out = base64_decode(ciphertext)?;
        let plaintext_len = opening_key
            .open_in_place(nonce, Aad::empty(), &mut *in_out)?
            .len();
        in_out.truncate(plaintext_len);
        Ok(in_out)
    }
}

/// `len` bytes from a CSPRNG
pub fn random_bytes(rng: &dyn SecureRandom, len: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    rng.fill(&mut bytes).map_err(|_| CryptoError::Random)?;
    Ok(bytes)
}

pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn base64_decode(text: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    Ok(Zeroizing::new(STANDARD.decode(text.trim())?))
}
