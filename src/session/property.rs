//! Session properties: credentials going in, server-assigned identity coming out.

use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

pub const AUTH_USER_ID: &str = "AUTH_USER_ID";
/// Secret. Sent as plain auth data unless a token is present.
pub const AUTH_PASSWORD: &str = "AUTH_PASSWORD";
/// Secret. When set the login uses token auth instead of the password.
pub const AUTH_TOKEN: &str = "AUTH_TOKEN";
pub const CLIENT_TYPE: &str = "CLIENT_TYPE";
pub const CLIENT_VER_MAJOR: &str = "CLIENT_VER_MAJOR";
pub const CLIENT_VER_MINOR: &str = "CLIENT_VER_MINOR";
pub const CLIENT_HOST: &str = "CLIENT_HOST";
/// IPv4 address announced in the handshake, as an integer.
pub const CLIENT_IP: &str = "CLIENT_IP";
pub const SERVER_VER_MAJOR: &str = "SERVER_VER_MAJOR";
pub const SERVER_VER_MINOR: &str = "SERVER_VER_MINOR";
pub const LOGIN_ID: &str = "LOGIN_ID";
pub const USER_NAME: &str = "USER_NAME";
pub const COMMUNITY: &str = "COMMUNITY";

#[derive(Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Int(u32),
    /// Wiped from memory when dropped and never printed.
    Secret(Zeroizing<Vec<u8>>),
}

impl PropertyValue {
    pub fn secret(bytes: impl Into<Vec<u8>>) -> Self {
        PropertyValue::Secret(Zeroizing::new(bytes.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw bytes of a text or secret value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Text(s) => Some(s.as_bytes()),
            PropertyValue::Secret(b) => Some(b),
            PropertyValue::Int(_) => None,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            PropertyValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            PropertyValue::Secret(_) => f.write_str("Secret(<redacted>)"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        PropertyValue::Int(u32::from(value))
    }
}

/// String-keyed property map.
#[derive(Debug, Default, Clone)]
pub struct Properties {
    values: HashMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: PropertyValue) -> Option<PropertyValue> {
        self.values.insert(key.to_string(), value)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.values.remove(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_text)
    }

    pub fn int(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(PropertyValue::as_int)
    }

    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(PropertyValue::as_bytes)
    }

    /// Integer property truncated to 16 bits, or `default`.
    pub fn u16_or(&self, key: &str, default: u16) -> u16 {
        self.int(key).map(|v| v as u16).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let mut props = Properties::new();
        props.set(AUTH_USER_ID, "alice".into());
        props.set(AUTH_PASSWORD, PropertyValue::secret("s3cret"));

        let printed = format!("{props:?}");
        assert!(printed.contains("alice"));
        assert!(!printed.contains("s3cret"));
        assert_eq!(props.bytes(AUTH_PASSWORD), Some(&b"s3cret"[..]));
    }

    #[test]
    fn test_typed_accessors() {
        let mut props = Properties::new();
        props.set(CLIENT_TYPE, 0x1700u16.into());
        props.set(USER_NAME, "Alice Example".into());

        assert_eq!(props.u16_or(CLIENT_TYPE, 0), 0x1700);
        assert_eq!(props.u16_or(CLIENT_VER_MAJOR, 0x1e), 0x1e);
        assert_eq!(props.text(CLIENT_TYPE), None);
        assert_eq!(props.text(USER_NAME), Some("Alice Example"));
    }
}
