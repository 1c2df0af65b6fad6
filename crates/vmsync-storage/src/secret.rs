use crate::error::{Result, StorageError};
use base64::{engine::general_purpose, Engine as _};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const KEY_FILE: &str = "secret.key";

/// 账号 client secret 加密器，使用 AES-256-GCM
pub struct SecretCipher {
    key_bytes: Vec<u8>,
}

impl SecretCipher {
    /// 从 `data_dir/secret.key` 加载或自动生成
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let key_path = data_dir.join(KEY_FILE);
        let key_bytes = if key_path.exists() {
            std::fs::read(&key_path)?
        } else {
            let rng = SystemRandom::new();
            let mut key = vec![0u8; 32];
            rng.fill(&mut key)
                .map_err(|_| StorageError::Crypto("failed to generate secret key".to_string()))?;
            std::fs::write(&key_path, &key)?;
            #[cfg(unix)]
            {
                let perms = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&key_path, perms)?;
            }
            tracing::info!(path = %key_path.display(), "Generated new secret encryption key");
            key
        };

        if key_bytes.len() != 32 {
            return Err(StorageError::Crypto(format!(
                "invalid secret key length: expected 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        Ok(Self { key_bytes })
    }

    fn key(&self) -> Result<LessSafeKey> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_| StorageError::Crypto("invalid secret key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// 返回 base64(nonce + ciphertext + tag)
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let key = self.key()?;
        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)
            .map_err(|_| StorageError::Crypto("failed to generate nonce".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| StorageError::Crypto("encryption failed".to_string()))?;

        let mut result = nonce_bytes.to_vec();
        result.extend_from_slice(&in_out);
        Ok(general_purpose::STANDARD.encode(&result))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let data = general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|e| StorageError::Crypto(format!("invalid ciphertext encoding: {e}")))?;
        if data.len() < NONCE_LEN + aead::AES_256_GCM.tag_len() {
            return Err(StorageError::Crypto("ciphertext too short".to_string()));
        }

        let key = self.key()?;
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| StorageError::Crypto("invalid nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| StorageError::Crypto("decryption failed".to_string()))?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|e| StorageError::Crypto(format!("secret is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decrypt_what_it_encrypted_with_reloaded_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cipher = SecretCipher::load_or_create(dir.path()).expect("cipher");
        let encrypted = cipher.encrypt("client-secret-value").expect("encrypt");
        assert_ne!(encrypted, "client-secret-value");

        let reloaded = SecretCipher::load_or_create(dir.path()).expect("reload");
        assert_eq!(reloaded.decrypt(&encrypted).expect("decrypt"), "client-secret-value");
    }

    #[test]
    fn should_reject_tampered_ciphertext() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cipher = SecretCipher::load_or_create(dir.path()).expect("cipher");
        assert!(cipher.decrypt("bm90LWEtcmVhbC1jaXBoZXJ0ZXh0LXZhbHVl").is_err());
    }
}
