//! Persisted token fields and their storage keys

use std::fmt;

/// One of the six persisted token fields.
///
/// Storage keys are stable: renaming one orphans every token already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenField {
    AccessToken,
    RefreshToken,
    IdToken,
    ExpiresIn,
    RefreshExpiresIn,
    ReceivedAt,
}

impl TokenField {
    pub const ALL: [TokenField; 6] = [
        TokenField::AccessToken,
        TokenField::RefreshToken,
        TokenField::IdToken,
        TokenField::ExpiresIn,
        TokenField::RefreshExpiresIn,
        TokenField::ReceivedAt,
    ];

    /// Key under which the field is persisted.
    pub fn key(self) -> &'static str {
        match self {
            TokenField::AccessToken => "ACCESSTOKEN",
            TokenField::RefreshToken => "REFRESHTOKEN",
            TokenField::IdToken => "IDTOKEN",
            TokenField::ExpiresIn => "EXPIRESIN",
            TokenField::RefreshExpiresIn => "REFRESHTOKEN_EXPIRESIN",
            TokenField::ReceivedAt => "RECEIVEDAT",
        }
    }
}

impl fmt::Display for TokenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fields holding token strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    AccessToken,
    RefreshToken,
    IdToken,
}

/// Fields holding integer seconds, persisted as base-10 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberField {
    ExpiresIn,
    RefreshExpiresIn,
    ReceivedAt,
}

impl From<TextField> for TokenField {
    fn from(field: TextField) -> Self {
        match field {
            TextField::AccessToken => TokenField::AccessToken,
            TextField::RefreshToken => TokenField::RefreshToken,
            TextField::IdToken => TokenField::IdToken,
        }
    }
}

impl From<NumberField> for TokenField {
    fn from(field: NumberField) -> Self {
        match field {
            NumberField::ExpiresIn => TokenField::ExpiresIn,
            NumberField::RefreshExpiresIn => TokenField::RefreshExpiresIn,
            NumberField::ReceivedAt => TokenField::ReceivedAt,
        }
    }
}

/// Parse a persisted numeric field. Malformed text reads as absent.
pub(crate) fn parse_number(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}
