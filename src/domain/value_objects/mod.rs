//! Value Objects for order export

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Opaque order identifier as handed over by the store.
///
/// Purely numeric ids travel as JSON numbers, anything else as a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: impl Into<String>) -> Result<Self, OrderIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(OrderIdError::Empty); }
        if value.chars().any(char::is_control) { return Err(OrderIdError::ControlCharacter); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn as_number(&self) -> Option<u64> {
        // leading zeros would not survive a round trip through a number
        let canonical = self.0 == "0" || !self.0.starts_with('0');
        if canonical && self.0.bytes().all(|b| b.is_ascii_digit()) { self.0.parse().ok() } else { None }
    }

    /// Form usable as a filename component. Every byte outside
    /// `[A-Za-z0-9-]` is percent-encoded, so distinct ids never share a file.
    pub fn file_safe(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for b in self.0.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' { out.push(b as char); } else { out.push_str(&format!("%{b:02X}")); }
        }
        out
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self { Self(value.to_string()) }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl Serialize for OrderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_number() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw { Number(u64), Text(String) }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::from(n)),
            Raw::Text(s) => Self::new(s).map_err(de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderIdError { Empty, ControlCharacter }
impl std::error::Error for OrderIdError {}
impl fmt::Display for OrderIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Order id empty"), Self::ControlCharacter => write!(f, "Order id contains control characters") }
    }
}

/// Bearer token issued by the downstream auth endpoint.
///
/// Lifetime is whatever the endpoint advertised, if anything.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken { value: String, expires_in: Option<Duration> }

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self { Self { value: value.into(), expires_in: None } }
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self { self.expires_in = Some(expires_in); self }
    pub fn secret(&self) -> &str { &self.value }
    pub fn expires_in(&self) -> Option<Duration> { self.expires_in }
    pub fn bearer_header(&self) -> String { format!("Bearer {}", self.value) }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("AccessToken(***)") }
}
