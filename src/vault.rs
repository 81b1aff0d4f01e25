//! Named EC keypair registry. Names in use: `gaen` (export signing),
//! `next_day_jwt` (delayed-key JWT), `hash_filter` (response hashing).

use std::collections::HashMap;

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;

use crate::error::AppError;

#[derive(Clone)]
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
    /// PKCS#8 PEM, kept alongside the parsed key so callers that need a
    /// different crate's key type (e.g. `jsonwebtoken`) can reparse it
    /// without re-deriving from raw scalar bytes.
    pub pkcs8_pem: String,
    /// SPKI PEM of the public half, for callers (e.g. the JWT verifier for
    /// self-issued tokens) that need to verify against this keypair without
    /// holding the private key.
    pub public_key_pem: String,
}

pub struct KeyVault {
    keys: HashMap<String, KeyPair>,
}

impl KeyVault {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Loads a PEM-encoded EC private key under `name`. Auto-detects
    /// PKCS#8 vs SEC1 encoding.
    pub fn load_pem(&mut self, name: &str, pem: &str) -> Result<(), AppError> {
        use p256::pkcs8::{EncodePrivateKey, EncodePublicKey};

        let secret = SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem))
            .map_err(|e| AppError::Signing(format!("failed to load key {name}: {e}")))?;
        let signing_key = SigningKey::from(secret.clone());
        let verifying_key = *signing_key.verifying_key();
        let pkcs8_pem = secret
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .map_err(|e| AppError::Signing(format!("failed to normalize key {name}: {e}")))?
            .to_string();
        let public_key_pem = secret
            .public_key()
            .to_public_key_pem(p256::pkcs8::LineEnding::LF)
            .map_err(|e| AppError::Signing(format!("failed to derive public key {name}: {e}")))?;
        self.keys.insert(
            name.to_string(),
            KeyPair {
                signing_key,
                verifying_key,
                pkcs8_pem,
                public_key_pem,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&KeyPair, AppError> {
        self.keys
            .get(name)
            .ok_or_else(|| AppError::Signing(format!("no key registered under {name}")))
    }
}

impl Default for KeyVault {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::EncodePrivateKey;

    fn generate_pkcs8_pem() -> String {
        let secret = SecretKey::random(&mut rand_core::OsRng);
        secret
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string()
    }

    #[test]
    fn loads_pkcs8_key_and_resolves_by_name() {
        let pem = generate_pkcs8_pem();
        let mut vault = KeyVault::new();
        vault.load_pem("gaen", &pem).unwrap();
        assert!(vault.get("gaen").is_ok());
    }

    #[test]
    fn unknown_name_is_an_error() {
        let vault = KeyVault::new();
        assert!(vault.get("nope").is_err());
    }
}
