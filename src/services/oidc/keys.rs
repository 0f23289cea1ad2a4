//! Process signing key (EC P-256, ES256).
//!
//! Loaded once at startup from a PKCS#8 PEM file. In provisioning mode a
//! missing file is generated and persisted instead of failing.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use josekit::jws::ES256;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::services::oidc::OidcError;

#[derive(Clone)]
pub struct SigningKey {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    kid: String,
    public_jwk: Map<String, Value>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("SigningKey").field("kid", &self.kid).finish()
    }
}

impl SigningKey {
    pub fn load_or_provision(path: &Path, provisioning: bool) -> Result<Self, OidcError> {
        if path.exists() {
            let pem = std::fs::read(path).map_err(|e| {
                OidcError::KeyMaterialInvalid(format!("cannot read {}: {}", path.display(), e))
            })?;
            let key = Self::from_pkcs8_pem(&pem)?;
            info!(path = %path.display(), kid = key.kid(), "signing key loaded");
            return Ok(key);
        }

        if !provisioning {
            return Err(OidcError::KeyMaterialMissing(path.to_path_buf()));
        }

        let pem = generate_pkcs8_pem()?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .and_then(|mut f| f.write_all(&pem).map(|_| f))
            .map_err(|e| {
                OidcError::KeyMaterialInvalid(format!("cannot write {}: {}", path.display(), e))
            })?;
        let _ = file.flush();

        let key = Self::from_pkcs8_pem(&pem)?;
        info!(path = %path.display(), kid = key.kid(), "new signing key generated");
        Ok(key)
    }

    /// Fresh in-memory key, never persisted.
    #[cfg(test)]
    pub fn generate() -> Result<Self, OidcError> {
        Self::from_pkcs8_pem(&generate_pkcs8_pem()?)
    }

    pub fn from_pkcs8_pem(pem: &[u8]) -> Result<Self, OidcError> {
        let key_pair = ES256
            .key_pair_from_pem(pem)
            .map_err(|e| OidcError::KeyMaterialInvalid(e.to_string()))?;

        let encoding_key = EncodingKey::from_ec_pem(&key_pair.to_pem_private_key())
            .map_err(|e| OidcError::KeyMaterialInvalid(e.to_string()))?;
        let decoding_key = DecodingKey::from_ec_pem(&key_pair.to_pem_public_key())
            .map_err(|e| OidcError::KeyMaterialInvalid(e.to_string()))?;

        let kid = URL_SAFE_NO_PAD.encode(Sha256::digest(key_pair.to_der_public_key()));

        let mut public_jwk: Map<String, Value> = key_pair.to_jwk_public_key().as_ref().clone();
        public_jwk.insert("kid".into(), Value::String(kid.clone()));
        public_jwk.insert("use".into(), Value::String("sig".into()));
        public_jwk.insert("alg".into(), Value::String("ES256".into()));

        Ok(Self {
            encoding_key,
            decoding_key,
            kid,
            public_jwk,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// JWK Set with the public half of this key.
    pub fn jwks(&self) -> Value {
        json!({ "keys": [self.public_jwk] })
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, OidcError> {
        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            OidcError::KeyMaterialInvalid(e.to_string())
        })
    }
}

fn generate_pkcs8_pem() -> Result<Vec<u8>, OidcError> {
    let key_pair = ES256
        .generate_key_pair()
        .map_err(|e| OidcError::KeyMaterialInvalid(e.to_string()))?;
    Ok(key_pair.to_pem_private_key())
}
