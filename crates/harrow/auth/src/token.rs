use harrow_api::{error::AuthError, principal::Principal};
use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    DecodingKey, Validation,
};
use serde::Deserialize;
use tracing::{instrument, warn, Level};

use crate::label::sanitize;

/// The claim shapes this gateway recognizes, decoded once at the
/// resolver boundary.
///
/// A token carrying a `sub` claim is a user token and identifies the
/// tenant through the nested `context.user.name` claim; a token
/// carrying `azp` instead is a client token and identifies a service
/// caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenClaims {
    User { name: Option<String> },
    Client { authorized_party: String },
    Unrecognized,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    context: Option<RawClaimContext>,
}

#[derive(Deserialize)]
struct RawClaimContext {
    #[serde(default)]
    user: Option<RawClaimUser>,
}

#[derive(Deserialize)]
struct RawClaimUser {
    #[serde(default)]
    name: Option<String>,
}

impl From<RawClaims> for TokenClaims {
    fn from(claims: RawClaims) -> Self {
        if claims.sub.is_some() {
            Self::User {
                name: claims
                    .context
                    .and_then(|context| context.user)
                    .and_then(|user| user.name),
            }
        } else if let Some(authorized_party) = claims.azp {
            Self::Client { authorized_party }
        } else {
            Self::Unrecognized
        }
    }
}

/// Derives the tenant principal from verified claims.
///
/// `@` is rewritten to `_` before sanitizing: it is illegal in a label
/// value, and rewriting first keeps email-derived usernames readable.
pub fn resolve_principal(claims: TokenClaims) -> Result<Principal, AuthError> {
    let raw = match claims {
        TokenClaims::User { name: Some(name) } => name.replace('@', "_"),
        TokenClaims::Client { authorized_party } => authorized_party,
        TokenClaims::User { name: None } | TokenClaims::Unrecognized => {
            return Err(AuthError::NoIdentity)
        }
    };
    let label_safe = sanitize(&raw);
    Ok(Principal { raw, label_safe })
}

/// Verifies bearer tokens against a remote JWK set.
#[derive(Clone, Debug)]
pub struct JwksVerifier {
    endpoint: String,
    client: ::reqwest::Client,
}

impl JwksVerifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Default::default(),
        }
    }

    #[instrument(level = Level::INFO, skip(self, token), err(Display))]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let endpoint = &self.endpoint;
        let keys: JwkSet = self
            .client
            .get(endpoint)
            .send()
            .await
            .and_then(::reqwest::Response::error_for_status)
            .map_err(|error| {
                AuthError::TokenInvalid(format!("failed to fetch the key set ({endpoint}): {error}"))
            })?
            .json()
            .await
            .map_err(|error| {
                AuthError::TokenInvalid(format!("failed to parse the key set ({endpoint}): {error}"))
            })?;

        verify_with_keys(token, &keys)
    }

    /// Resolves the caller's principal from the request's bearer token.
    /// Fails with [`AuthError::TokenMissing`] when no token is present,
    /// so callers of unscoped endpoints should not use this path.
    #[cfg(feature = "actix")]
    #[instrument(level = Level::INFO, skip(self, request), err(Display))]
    pub async fn resolve(
        &self,
        request: &::actix_web::HttpRequest,
    ) -> Result<Principal, AuthError> {
        let token = get_bearer_token(request).ok_or(AuthError::TokenMissing)?;
        self.verify(token).await.and_then(resolve_principal)
    }
}

/// Checks the token signature against the given key set and decodes the
/// claims. The key is selected by the header's `kid` when present;
/// otherwise every key is tried in order.
pub fn verify_with_keys(token: &str, keys: &JwkSet) -> Result<TokenClaims, AuthError> {
    let header =
        decode_header(token).map_err(|error| AuthError::TokenInvalid(error.to_string()))?;

    let candidates: Vec<&Jwk> = match header.kid.as_deref().and_then(|kid| keys.find(kid)) {
        Some(key) => vec![key],
        None => keys.keys.iter().collect(),
    };

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;

    let mut last_error = None;
    for key in candidates {
        let key = match DecodingKey::from_jwk(key) {
            Ok(key) => key,
            Err(error) => {
                warn!("skipping an unusable key in the key set: {error}");
                continue;
            }
        };
        match decode::<RawClaims>(token, &key, &validation) {
            Ok(data) => return Ok(data.claims.into()),
            Err(error) => last_error = Some(error),
        }
    }

    Err(AuthError::TokenInvalid(match last_error {
        Some(error) => error.to_string(),
        None => "no usable key in the key set".into(),
    }))
}

/// Extracts the bearer token from the `Authorization` header, if any.
/// Absence is a valid state for unscoped read-only endpoints.
#[cfg(feature = "actix")]
pub fn get_bearer_token(request: &::actix_web::HttpRequest) -> Option<&str> {
    const HEADER_AUTHORIZATION: &str = "Authorization";

    request
        .headers()
        .get(HEADER_AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
