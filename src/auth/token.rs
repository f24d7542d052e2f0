//! Signed bearer tokens in compact JWT form (HS256/384/512).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::digest::{InvalidLength, KeyInit};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::error::{AppError, AuthError};

/// Claim reserved for the expiry timestamp; always set by the issuer.
pub const EXPIRY_CLAIM: &str = "exp";
pub const SUBJECT_CLAIM: &str = "sub";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl TokenAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenAlgorithm::HS256 => "HS256",
            TokenAlgorithm::HS384 => "HS384",
            TokenAlgorithm::HS512 => "HS512",
        }
    }

    fn sign(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        match self {
            TokenAlgorithm::HS256 => hmac_digest::<Hmac<Sha256>>(key, data),
            TokenAlgorithm::HS384 => hmac_digest::<Hmac<Sha384>>(key, data),
            TokenAlgorithm::HS512 => hmac_digest::<Hmac<Sha512>>(key, data),
        }
    }
}

impl fmt::Display for TokenAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenAlgorithm {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(TokenAlgorithm::HS256),
            "HS384" => Ok(TokenAlgorithm::HS384),
            "HS512" => Ok(TokenAlgorithm::HS512),
            other => Err(AppError::ConfigError(format!(
                "Unsupported token algorithm: {}",
                other
            ))),
        }
    }
}

fn hmac_digest<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = <M as KeyInit>::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// A JSON scalar carried as a claim value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for ClaimValue {
    fn from(v: &str) -> Self {
        ClaimValue::Str(v.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(v: String) -> Self {
        ClaimValue::Str(v)
    }
}

impl From<i64> for ClaimValue {
    fn from(v: i64) -> Self {
        ClaimValue::Int(v)
    }
}

impl From<f64> for ClaimValue {
    fn from(v: f64) -> Self {
        ClaimValue::Float(v)
    }
}

impl From<bool> for ClaimValue {
    fn from(v: bool) -> Self {
        ClaimValue::Bool(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ClaimValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ClaimValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str(SUBJECT_CLAIM)
    }

    pub fn expires_at(&self) -> Option<i64> {
        match self.0.get(EXPIRY_CLAIM) {
            Some(ClaimValue::Int(exp)) => Some(*exp),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

pub struct TokenIssuer {
    algorithm: TokenAlgorithm,
    secret: Vec<u8>,
}

impl TokenIssuer {
    pub fn new(algorithm: TokenAlgorithm, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            secret: secret.into(),
        }
    }

    pub fn issue(&self, claims: &Claims, ttl: Duration) -> Result<String, AppError> {
        self.issue_at(claims, ttl, Utc::now())
    }

    /// Mint a token as if the current time were `now`. Any `exp` in
    /// `claims` is replaced by `now + ttl`.
    pub fn issue_at(
        &self,
        claims: &Claims,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let header = TokenHeader {
            alg: self.algorithm.as_str().to_string(),
            typ: "JWT".to_string(),
        };

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::InternalError("Token expiry out of range".to_string()))?;

        let mut payload = claims.clone();
        payload.insert(EXPIRY_CLAIM, expires_at.timestamp());

        let header_b64 = URL_SAFE_NO_PAD.encode(to_json(&header)?);
        let payload_b64 = URL_SAFE_NO_PAD.encode(to_json(&payload)?);
        let signing_input = format!("{}.{}", header_b64, payload_b64);

        let signature = self
            .algorithm
            .sign(&self.secret, signing_input.as_bytes())
            .map_err(|e| AppError::InternalError(format!("Token signing failed: {}", e)))?;

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Check signature and expiry as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::InvalidToken);
        };

        let header: TokenHeader = from_segment(header_b64)?;
        if header.alg != self.algorithm.as_str() || header.typ != "JWT" {
            return Err(AuthError::InvalidToken);
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let signing_input_len = header_b64.len() + 1 + payload_b64.len();
        let expected = self
            .algorithm
            .sign(&self.secret, token[..signing_input_len].as_bytes())
            .map_err(|_| AuthError::InvalidToken)?;

        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(AuthError::InvalidToken);
        }

        let claims: Claims = from_segment(payload_b64)?;
        let exp = claims.expires_at().ok_or(AuthError::InvalidToken)?;
        if now.timestamp() >= exp {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec(value)
        .map_err(|e| AppError::InternalError(format!("Token serialization failed: {}", e)))
}

fn from_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}
