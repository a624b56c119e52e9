//! Out-of-band password delivery for launch profiles.
//!
//! Profiles may end up in logs, so they must never carry a plaintext
//! password. Encryption replaces the password with a single-use key and IV
//! (`encryptionKey = "<base64 key>|<base64 iv>"`) and hands the ciphertext
//! back to the caller. The ciphertext must reach the session through a
//! separate channel (file, pipe, RPC), never through the profile, argv,
//! environment, or stdin of the launched process.
//!
//! Either operation leaves the profile untouched when it fails.

use crate::config::types::{CryptoError, LaunchError, Result};
use crate::crypto::{base64_decode, base64_encode, AesGcmCipher, PasswordCipher};
use crate::profile::launch::SessionLaunchProfile;
use zeroize::Zeroize;

/// Separator between the key and IV parts of `encryptionKey`
pub const KEY_SEPARATOR: char = '|';

/// Encrypt the profile password with a fresh key.
///
/// Returns the base64 ciphertext to deliver out-of-band. On success the
/// profile's `password` is empty and `encryption_key` holds key and IV.
pub fn encrypt_profile_password(profile: &mut SessionLaunchProfile) -> Result<String> {
    encrypt_profile_password_with(&AesGcmCipher::new(), profile)
}

/// Recover the password from the out-of-band ciphertext.
///
/// On success `password` holds the plaintext and `encryption_key` is empty.
pub fn decrypt_profile_password(
    profile: &mut SessionLaunchProfile,
    encrypted_password: &str,
) -> Result<()> {
    decrypt_profile_password_with(&AesGcmCipher::new(), profile, encrypted_password)
}

pub fn encrypt_profile_password_with(
    cipher: &dyn PasswordCipher,
    profile: &mut SessionLaunchProfile,
) -> Result<String> {
    let password_key = cipher.generate_key()?;
    let sealed = cipher.encrypt_as_base64(profile.password.as_bytes(), &password_key)?;
    let base64_password_key = base64_encode(&password_key);

    profile.password.zeroize();
    profile.encryption_key = format!("{}{}{}", base64_password_key, KEY_SEPARATOR, sealed.iv);

    log::debug!(
        "Encrypted launch profile password for {}",
        profile.context.username
    );
    Ok(sealed.ciphertext)
}

pub fn decrypt_profile_password_with(
    cipher: &dyn PasswordCipher,
    profile: &mut SessionLaunchProfile,
    encrypted_password: &str,
) -> Result<()> {
    let parts: Vec<&str> = profile.encryption_key.split(KEY_SEPARATOR).collect();
    let [password_key, iv_password_key] = parts.as_slice() else {
        return Err(LaunchError::InvalidKeyFormat);
    };

    let password_key = base64_decode(password_key)?;
    let decrypted = cipher.decrypt_base64(encrypted_password, &password_key, iv_password_key)?;
    let password = std::str::from_utf8(&decrypted)
        .map_err(|_| CryptoError::Utf8)?
        .to_string();

    profile.password = password;
    profile.encryption_key.zeroize();

    log::debug!(
        "Decrypted launch profile password for {}",
        profile.context.username
    );
    Ok(())
}
