use std::fmt;

use serde::{Deserialize, Serialize};

/// A metadata token identifying an entity of a [`crate::metadata::Module`].
///
/// Tokens in .NET metadata consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
///
/// Tokens are the identity of every type, method and member reference in the module graph.
/// The rewriting passes never renumber entities, so a token read before the passes run still
/// addresses the same entity afterwards.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub u32);

impl Token {
    /// Table id of `TypeDef` tokens
    pub const TABLE_TYPE_DEF: u8 = 0x02;
    /// Table id of `Field` tokens
    pub const TABLE_FIELD: u8 = 0x04;
    /// Table id of `MethodDef` tokens
    pub const TABLE_METHOD_DEF: u8 = 0x06;
    /// Table id of `MemberRef` tokens
    pub const TABLE_MEMBER_REF: u8 = 0x0A;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row index
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this token addresses the `MethodDef` table
    #[must_use]
    pub fn is_method_def(&self) -> bool {
        self.table() == Self::TABLE_METHOD_DEF
    }

    /// Returns true if this token addresses the `MemberRef` table
    #[must_use]
    pub fn is_member_ref(&self) -> bool {
        self.table() == Self::TABLE_MEMBER_REF
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
