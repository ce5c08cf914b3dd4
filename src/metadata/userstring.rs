//! String literals as the runtime stores them.
//!
//! .NET strings are sequences of UTF-16 code units and may contain unpaired surrogates, which
//! a Rust [`String`] cannot hold. [`UserString`] keeps the code units as they are and only
//! converts to UTF-8 for display.
//!
//! On the wire a well-formed string is a plain JSON string. Any other string is an object
//! carrying its code units, `{"utf16": [55296, 97]}`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An `ldstr` operand or a string returned by a live method.
///
/// # Examples
///
/// ```rust
/// use cryptoscope::metadata::userstring::UserString;
///
/// let text = UserString::from("abc");
/// assert_eq!(text.as_string().as_deref(), Some("abc"));
///
/// let broken = UserString::from_utf16(vec![0xD800, 0x61]);
/// assert_eq!(broken.as_string(), None);
/// assert_eq!(broken.to_string(), "\u{FFFD}a");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct UserString(Vec<u16>);

impl UserString {
    /// Wraps raw UTF-16 code units
    #[must_use]
    pub fn from_utf16(units: Vec<u16>) -> Self {
        UserString(units)
    }

    /// The UTF-16 code units
    #[must_use]
    pub fn units(&self) -> &[u16] {
        &self.0
    }

    /// Number of UTF-16 code units
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The string as UTF-8, `None` if it contains unpaired surrogates.
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        String::from_utf16(&self.0).ok()
    }

    /// The string as UTF-8, unpaired surrogates replaced by U+FFFD.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for UserString {
    fn from(value: &str) -> Self {
        UserString(value.encode_utf16().collect())
    }
}

impl From<String> for UserString {
    fn from(value: String) -> Self {
        UserString::from(value.as_str())
    }
}

impl PartialEq<str> for UserString {
    fn eq(&self, other: &str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for UserString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Display for UserString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for UserString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_string() {
            Some(text) => write!(f, "{text:?}"),
            None => f.debug_tuple("UserString").field(&self.0).finish(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Wire {
    Text(String),
    Units { utf16: Vec<u16> },
}

impl Serialize for UserString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_string() {
            Some(text) => Wire::Text(text),
            None => Wire::Units {
                utf16: self.0.clone(),
            },
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UserString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(text) => UserString::from(text),
            Wire::Units { utf16 } => UserString(utf16),
        })
    }
}
