//! Signing and signature checking of token payloads.
//!
//! Key material comes from a [`KeyProvider`]; the provider decides where keys
//! live. Keys are immutable once loaded and shared read-only across requests.

use crate::error::{SigningError, VerifyError};
use crate::token::TokenClaims;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::sync::Arc;

pub struct SigningKey {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// HMAC-SHA256 key from a shared secret.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// RS256 key pair from PEM-encoded private and public keys.
    pub fn from_rsa_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, SigningError> {
        Ok(Self {
            algorithm: Algorithm::RS256,
            encoding: EncodingKey::from_rsa_pem(private_pem)?,
            decoding: DecodingKey::from_rsa_pem(public_pem)?,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

pub trait KeyProvider: Send + Sync {
    /// The key to sign and verify with, or `None` when none is configured.
    fn signing_key(&self) -> Option<&SigningKey>;
}

/// Holds one key for the lifetime of the process.
pub struct StaticKeyProvider {
    key: Option<SigningKey>,
}

impl StaticKeyProvider {
    pub fn new(key: SigningKey) -> Self {
        Self { key: Some(key) }
    }

    pub fn unavailable() -> Self {
        Self { key: None }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn signing_key(&self) -> Option<&SigningKey> {
        self.key.as_ref()
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    keys: Arc<dyn KeyProvider>,
    issuer: String,
}

impl TokenSigner {
    pub fn new(keys: Arc<dyn KeyProvider>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn key(&self) -> Result<&SigningKey, SigningError> {
        self.keys.signing_key().ok_or(SigningError::KeyUnavailable)
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, SigningError> {
        let key = self.key()?;
        Ok(encode(&Header::new(key.algorithm), claims, &key.encoding)?)
    }

    /// Check signature and issuer and decode the payload.
    ///
    /// Expiry is not checked here: the caller compares `exp` against its own
    /// clock and the persisted record.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let key = self.key()?;
        let mut validation = Validation::new(key.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<TokenClaims>(token, &key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(VerifyError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use std::collections::BTreeMap;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn signer(secret: &[u8], issuer: &str) -> TokenSigner {
        TokenSigner::new(
            Arc::new(StaticKeyProvider::new(SigningKey::from_secret(secret))),
            issuer,
        )
    }

    fn claims() -> TokenClaims {
        TokenClaims {
            iss: "https://auth.example.org".into(),
            sub: "user-1".into(),
            jti: "token-1".into(),
            token_use: TokenKind::Refresh,
            scope: "openid".into(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
            identity: BTreeMap::new(),
        }
    }

    #[test]
    fn signed_token_verifies_even_when_past_exp() {
        let signer = signer(SECRET, "https://auth.example.org");
        let token = signer.sign(&claims()).expect("sign");

        assert_eq!(signer.verify(&token).expect("verify"), claims());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = signer(SECRET, "https://auth.example.org")
            .sign(&claims())
            .unwrap();
        let other = signer(b"ffffffffffffffffffffffffffffffff", "https://auth.example.org");

        assert!(matches!(other.verify(&token), Err(VerifyError::Rejected(_))));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let token = signer(SECRET, "https://auth.example.org")
            .sign(&claims())
            .unwrap();
        let other = signer(SECRET, "https://elsewhere.example.org");

        assert!(matches!(other.verify(&token), Err(VerifyError::Rejected(_))));
    }

    #[test]
    fn rsa_key_signs_and_verifies() {
        let key = SigningKey::from_rsa_pem(
            include_bytes!("../../tests/fixtures/rsa_private.pem"),
            include_bytes!("../../tests/fixtures/rsa_public.pem"),
        )
        .expect("rsa key");
        assert_eq!(key.algorithm(), Algorithm::RS256);
        let rsa = TokenSigner::new(Arc::new(StaticKeyProvider::new(key)), "https://auth.example.org");

        let token = rsa.sign(&claims()).expect("sign");

        assert_eq!(jsonwebtoken::decode_header(&token).unwrap().alg, Algorithm::RS256);
        assert_eq!(rsa.verify(&token).expect("verify"), claims());
        assert!(matches!(
            signer(SECRET, "https://auth.example.org").verify(&token),
            Err(VerifyError::Rejected(_))
        ));
    }

    #[test]
    fn malformed_pem_is_rejected() {
        assert!(SigningKey::from_rsa_pem(b"nope", b"nope").is_err());
    }

    #[test]
    fn missing_key_is_a_signing_error() {
        let signer = TokenSigner::new(Arc::new(StaticKeyProvider::unavailable()), "iss");

        assert!(matches!(
            signer.sign(&claims()),
            Err(SigningError::KeyUnavailable)
        ));
        assert!(matches!(
            signer.verify("a.b.c"),
            Err(VerifyError::Signing(SigningError::KeyUnavailable))
        ));
    }
}
