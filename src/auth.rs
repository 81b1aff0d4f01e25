//! Claim extraction and scope checks. Two adapter variants: `JwtAuth` does
//! real JWT parsing and EC signature verification; `PassThroughAuth` trusts
//! claims handed to it directly and exists only for tests.

use chrono::NaiveDate;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Decoded and already-verified JWT claims for an upload request. Shared by
/// both `"exposed"` and `"exposed-next-day"` tokens; for the latter `onset`
/// carries the permitted delayed-key date rather than a symptom-onset date.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub scope: String,
    pub onset: NaiveDate,
    pub fake: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Raw claim shape as carried on the wire (`fake` travels as "0"/"1").
#[derive(Serialize, Deserialize)]
struct WireClaims {
    scope: String,
    onset: NaiveDate,
    fake: String,
    iat: i64,
    exp: i64,
}

impl From<&Claims> for WireClaims {
    fn from(c: &Claims) -> Self {
        WireClaims {
            scope: c.scope.clone(),
            onset: c.onset,
            fake: if c.fake { "1".into() } else { "0".into() },
            iat: c.iat,
            exp: c.exp,
        }
    }
}

/// Signs `claims` as an ES256 JWT with `encoding_key`. Used to issue the
/// `"exposed-next-day"` token handed back from the initial `exposed` upload.
pub fn encode_claims(claims: &Claims, encoding_key: &EncodingKey) -> Result<String, AppError> {
    let wire = WireClaims::from(claims);
    jsonwebtoken::encode(&Header::new(Algorithm::ES256), &wire, encoding_key)
        .map_err(|e| AppError::Signing(format!("failed to sign token: {e}")))
}

pub trait AuthAdapter: Send + Sync {
    /// Decodes and verifies a bearer token against the key registered for
    /// `expected_scope`, returning its claims. `exp` must be in the future
    /// relative to `now_ms`.
    fn decode(&self, bearer_token: &str, expected_scope: &str, now_ms: i64) -> Result<Claims, AppError>;

    /// Raises `WrongScope` if `claims.scope` doesn't match `expected`.
    fn validate(&self, claims: &Claims, expected_scope: &str) -> Result<(), AppError> {
        if claims.scope != expected_scope {
            return Err(AppError::WrongScope(format!(
                "expected scope {expected_scope}, got {}",
                claims.scope
            )));
        }
        Ok(())
    }

    fn is_fake(&self, claims: &Claims) -> bool {
        claims.fake
    }

    fn onset(&self, claims: &Claims) -> NaiveDate {
        claims.onset
    }
}

/// Production adapter: verifies against a registry of EC public keys, one
/// per scope. `"exposed"` tokens are issued externally (the diagnosis
/// verification server) and verified against `GAEN_JWT_PUBLIC_KEY_PEM`;
/// `"exposed-next-day"` tokens are self-issued and verified against the
/// vault's own `next_day_jwt` keypair's public half — two independently
/// keyed scopes, never cross-checked against the wrong key.
pub struct JwtAuth {
    decoding_keys: std::collections::HashMap<String, DecodingKey>,
}

impl JwtAuth {
    pub fn new(decoding_keys: std::collections::HashMap<String, DecodingKey>) -> Self {
        Self { decoding_keys }
    }
}

impl AuthAdapter for JwtAuth {
    fn decode(&self, bearer_token: &str, expected_scope: &str, now_ms: i64) -> Result<Claims, AppError> {
        let decoding_key = self.decoding_keys.get(expected_scope).ok_or_else(|| {
            AppError::AuthFailure(format!("no verification key registered for scope {expected_scope}"))
        })?;

        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_exp = true;
        let token = bearer_token.strip_prefix("Bearer ").unwrap_or(bearer_token);

        let data = jsonwebtoken::decode::<WireClaims>(token, decoding_key, &validation)
            .map_err(|e| AppError::AuthFailure(e.to_string()))?;

        let now_s = now_ms / 1000;
        if data.claims.exp <= now_s {
            return Err(AppError::AuthFailure("token expired".into()));
        }

        Ok(Claims {
            scope: data.claims.scope,
            onset: data.claims.onset,
            fake: data.claims.fake == "1",
            iat: data.claims.iat,
            exp: data.claims.exp,
        })
    }
}

/// Test-only adapter: the "token" is the claims themselves, JSON-encoded,
/// with no signature. Never wired into the production router.
pub struct PassThroughAuth;

impl AuthAdapter for PassThroughAuth {
    fn decode(&self, bearer_token: &str, _expected_scope: &str, _now_ms: i64) -> Result<Claims, AppError> {
        serde_json::from_str(bearer_token)
            .map_err(|e| AppError::AuthFailure(format!("bad test claims: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(scope: &str, onset: &str, fake: bool) -> Claims {
        Claims {
            scope: scope.to_string(),
            onset: onset.parse().unwrap(),
            fake,
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn validate_accepts_matching_scope() {
        let adapter = PassThroughAuth;
        let c = claims("exposed", "2024-01-01", false);
        assert!(adapter.validate(&c, "exposed").is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_scope() {
        let adapter = PassThroughAuth;
        let c = claims("exposed-next-day", "2024-01-01", false);
        assert!(matches!(
            adapter.validate(&c, "exposed"),
            Err(AppError::WrongScope(_))
        ));
    }

    #[test]
    fn pass_through_decodes_json_claims() {
        let adapter = PassThroughAuth;
        let raw = r#"{"scope":"exposed","onset":"2024-03-01","fake":false,"iat":0,"exp":9999999999}"#;
        let c = adapter.decode(raw, "exposed", 0).unwrap();
        assert_eq!(c.scope, "exposed");
        assert!(!adapter.is_fake(&c));
        assert_eq!(adapter.onset(&c).to_string(), "2024-03-01");
    }

    #[test]
    fn jwt_auth_verifies_against_the_key_registered_for_the_scope() {
        use p256::pkcs8::EncodePrivateKey;

        use p256::pkcs8::EncodePublicKey;

        let secret = p256::SecretKey::random(&mut rand_core::OsRng);
        let pkcs8_pem = secret.to_pkcs8_pem(p256::pkcs8::LineEnding::LF).unwrap().to_string();
        let encoding_key = EncodingKey::from_ec_pem(pkcs8_pem.as_bytes()).unwrap();

        let public_pem = secret
            .public_key()
            .to_public_key_pem(p256::pkcs8::LineEnding::LF)
            .unwrap();
        let decoding_key = DecodingKey::from_ec_pem(public_pem.as_bytes()).unwrap();

        let mut keys = std::collections::HashMap::new();
        keys.insert("exposed-next-day".to_string(), decoding_key);
        let adapter = JwtAuth::new(keys);

        let claims = claims("exposed-next-day", "2024-01-01", false);
        let token = encode_claims(&claims, &encoding_key).unwrap();

        let decoded = adapter.decode(&token, "exposed-next-day", 0).unwrap();
        assert_eq!(decoded.scope, "exposed-next-day");

        // a token for an unregistered scope has no key to verify against
        assert!(adapter.decode(&token, "exposed", 0).is_err());
    }
}
