// # Token Store Trait
//
// Defines the interface for persisting the single push recipient token.
//
// ## Purpose
//
// The store holds exactly one logical token at a time. Every registration
// overwrites the previous one (last-write-wins), and every alert reads the
// current value at send time, so a registration takes effect on the next
// alert without any caching layer in between.
//
// ## Implementations
//
// - File-based: one JSON record, atomically replaced on update
// - In-memory: for tests and embedding

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// An opaque push recipient identifier and when it was registered
///
/// The payload is never empty; absence of a token is represented by
/// `Option::None` at the store boundary, never by a malformed `Token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenRecord", into = "TokenRecord")]
pub struct Token {
    payload: String,
    created_at: DateTime<Utc>,
}

impl Token {
    /// Create a token, rejecting an empty payload
    pub fn new(payload: impl Into<String>, created_at: DateTime<Utc>) -> Result<Self, Error> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(Error::invalid_argument("Token payload cannot be empty"));
        }
        Ok(Self {
            payload,
            created_at,
        })
    }

    /// Create a token stamped with the current time
    pub fn issued_now(payload: impl Into<String>) -> Result<Self, Error> {
        Self::new(payload, Utc::now())
    }

    /// The recipient identifier issued by the push backend's client SDK
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Registration time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// On-disk shape of a token
#[derive(Serialize, Deserialize)]
struct TokenRecord {
    payload: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRecord> for Token {
    type Error = Error;

    fn try_from(record: TokenRecord) -> Result<Self, Self::Error> {
        Token::new(record.payload, record.created_at)
    }
}

impl From<Token> for TokenRecord {
    fn from(token: Token) -> Self {
        Self {
            payload: token.payload,
            created_at: token.created_at,
        }
    }
}

/// Trait for token store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Concurrent `update` calls must never leave a partially written record
/// visible to `get`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist `token`, replacing any prior value
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Token persisted
    /// - `Err(Error::InvalidArgument)`: Token payload is empty
    /// - `Err(Error)`: Storage error
    async fn update(&self, token: Token) -> Result<(), Error>;

    /// Get the most recently persisted token
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Token))`: The current token
    /// - `Ok(None)`: Nothing was ever stored (or the backing file is missing)
    /// - `Err(Error)`: Storage error or corrupt record
    async fn get(&self) -> Result<Option<Token>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_is_rejected() {
        assert!(matches!(
            Token::issued_now(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_whitespace_payload_is_kept_verbatim() {
        let token = Token::issued_now("  ").unwrap();
        assert_eq!(token.payload(), "  ");
    }

    #[test]
    fn test_token_equality_is_structural() {
        let at = Utc::now();
        let t1 = Token::new("my_payload", at).unwrap();
        let t2 = Token::new("other_payload", at).unwrap();
        let t3 = Token::new("my_payload", at).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(t1, t3);
    }

    #[test]
    fn test_deserializing_empty_payload_fails() {
        let json = r#"{"payload":"","created_at":"2025-01-09T12:00:00Z"}"#;
        assert!(serde_json::from_str::<Token>(json).is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_fields() {
        let token = Token::issued_now("abc").unwrap();
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["payload"], "abc");
        assert!(json["created_at"].is_string());
        let back: Token = serde_json::from_value(json).unwrap();
        assert_eq!(back, token);
    }
}
