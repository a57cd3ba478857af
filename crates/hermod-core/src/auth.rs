//! Auth binding: verifies a bearer token and caches a hydrated identity
//! (spec §4.4).

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::AuthError;

/// Where the verification key comes from.
pub enum SecretSource {
    /// A fixed secret shared by every token this provider verifies.
    Static(Vec<u8>),
    /// A callback that resolves a secret from the token's header, e.g. by
    /// `kid`. Returns [`AuthError::SecretUnavailable`] if no key is found.
    Dynamic(Box<dyn Fn(&jsonwebtoken::Header) -> Result<Vec<u8>, AuthError> + Send + Sync>),
}

/// Derives an application-specific "hydrated" value from verified claims.
pub trait Hydrator<H>: Send + Sync {
    /// Produces `H` from the token's claims, or fails if they are
    /// insufficient (e.g. a required claim is missing).
    fn hydrate(&self, claims: &Value) -> Result<H, AuthError>;
}

impl<H, F> Hydrator<H> for F
where
    F: Fn(&Value) -> Result<H, AuthError> + Send + Sync,
{
    fn hydrate(&self, claims: &Value) -> Result<H, AuthError> {
        self(claims)
    }
}

/// Static configuration shared by every [`AuthProvider`] built from it.
pub struct AuthConfig<H> {
    /// The signing-method predicate: tokens using any other algorithm are
    /// rejected before key lookup.
    pub algorithm: Algorithm,
    /// Where to find the verification key.
    pub secret: SecretSource,
    /// Derives the cached hydrated value from verified claims.
    pub hydrator: Box<dyn Hydrator<H>>,
}

struct Verified<H> {
    token: String,
    hydrated: H,
}

/// A verified-token wrapper optionally caching a hydrated identity.
///
/// All access is guarded by a reader-writer lock: `update` is the sole
/// writer, `get_hydrated`/`token` are readers called concurrently by
/// endpoint handlers (spec §4.4, §5).
pub struct AuthProvider<H> {
    config: Arc<AuthConfig<H>>,
    verified: RwLock<Option<Verified<H>>>,
}

impl<H> AuthProvider<H>
where
    H: Clone + Send + Sync,
{
    /// Builds a provider with no verified token yet.
    #[must_use]
    pub fn new(config: Arc<AuthConfig<H>>) -> Self {
        Self { config, verified: RwLock::new(None) }
    }

    /// Verifies `token`, hydrates it, and replaces any previously verified
    /// token. Concurrent readers observe either the old or the new value
    /// atomically, never a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the signature or claims fail
    /// verification, [`AuthError::UnsupportedAlgorithm`] if the token's
    /// algorithm does not match [`AuthConfig::algorithm`],
    /// [`AuthError::SecretUnavailable`] if the configured secret source
    /// fails to produce a key, or [`AuthError::HydrationFailed`] if the
    /// hydrator rejects the claims.
    pub async fn update(&self, token: &str) -> Result<(), AuthError> {
        let claims = verify(token, &self.config)?;
        let hydrated = self.config.hydrator.hydrate(&claims)?;
        *self.verified.write().await = Some(Verified { token: token.to_string(), hydrated });
        Ok(())
    }

    /// The hydrated value from the most recently verified token, if any.
    pub async fn get_hydrated(&self) -> Option<H> {
        self.verified.read().await.as_ref().map(|v| v.hydrated.clone())
    }

    /// The most recently verified raw token, if any.
    pub async fn token(&self) -> Option<String> {
        self.verified.read().await.as_ref().map(|v| v.token.clone())
    }
}

fn verify<H>(token: &str, config: &AuthConfig<H>) -> Result<Value, AuthError> {
    let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    if header.alg != config.algorithm {
        return Err(AuthError::UnsupportedAlgorithm);
    }

    let secret = match &config.secret {
        SecretSource::Static(bytes) => bytes.clone(),
        SecretSource::Dynamic(resolve) => resolve(&header)?,
    };

    let key = DecodingKey::from_secret(&secret);
    let validation = Validation::new(config.algorithm);
    let data = decode::<Value>(token, &key, &validation).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn token_with_claims(claims: &Value) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn static_config(hydrator: impl Hydrator<String> + 'static) -> Arc<AuthConfig<String>> {
        Arc::new(AuthConfig {
            algorithm: Algorithm::HS256,
            secret: SecretSource::Static(SECRET.to_vec()),
            hydrator: Box::new(hydrator),
        })
    }

    #[tokio::test]
    async fn update_succeeds_and_caches_hydrated_value() {
        let config = static_config(|claims: &Value| {
            claims
                .get("sub")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AuthError::HydrationFailed("missing sub".to_string()))
        });
        let provider = AuthProvider::new(config);

        let token = token_with_claims(&json!({"sub": "alice"}));
        provider.update(&token).await.unwrap();

        assert_eq!(provider.get_hydrated().await, Some("alice".to_string()));
        assert_eq!(provider.token().await, Some(token));
    }

    #[tokio::test]
    async fn before_any_update_nothing_is_cached() {
        let config = static_config(|_: &Value| Ok("unused".to_string()));
        let provider = AuthProvider::new(config);
        assert_eq!(provider.get_hydrated().await, None);
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let config = static_config(|_: &Value| Ok("unused".to_string()));
        let provider = AuthProvider::new(config);

        let mut token = token_with_claims(&json!({"sub": "alice"}));
        token.push('x');

        assert!(provider.update(&token).await.is_err());
        assert_eq!(provider.get_hydrated().await, None);
    }

    #[tokio::test]
    async fn hydrator_failure_does_not_replace_previous_value() {
        let config = static_config(|claims: &Value| {
            claims
                .get("sub")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AuthError::HydrationFailed("missing sub".to_string()))
        });
        let provider = AuthProvider::new(config);

        let good = token_with_claims(&json!({"sub": "alice"}));
        provider.update(&good).await.unwrap();

        let bad = token_with_claims(&json!({}));
        assert!(provider.update(&bad).await.is_err());

        // The earlier, successful hydration is still in place.
        assert_eq!(provider.get_hydrated().await, Some("alice".to_string()));
    }

    #[tokio::test]
    async fn wrong_algorithm_is_rejected_before_key_lookup() {
        let config: Arc<AuthConfig<String>> = Arc::new(AuthConfig {
            algorithm: Algorithm::HS384,
            secret: SecretSource::Static(SECRET.to_vec()),
            hydrator: Box::new(|_: &Value| Ok("unused".to_string())),
        });
        let provider = AuthProvider::new(config);

        let token = token_with_claims(&json!({"sub": "alice"}));
        let err = provider.update(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedAlgorithm));
    }
}
