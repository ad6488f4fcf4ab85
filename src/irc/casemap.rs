//! Identity comparison for nicks and channel names.
//!
//! Channel names always compare ASCII case-insensitively. Nick comparison is
//! a configured [`NickCasing`]; the default is exact, byte-for-byte.

use serde::{Deserialize, Serialize};

/// How two nicks are compared when looking users up inside a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NickCasing {
    /// Byte-for-byte.
    #[default]
    Exact,
    /// ASCII letters fold to lower case.
    Ascii,
    /// ASCII folding plus `[]\~` ≡ `{}|^`.
    Rfc1459,
}

impl NickCasing {
    pub fn eq(self, a: &str, b: &str) -> bool {
        match self {
            NickCasing::Exact => a == b,
            NickCasing::Ascii => a.eq_ignore_ascii_case(b),
            NickCasing::Rfc1459 => {
                a.len() == b.len() && a.chars().zip(b.chars()).all(|(x, y)| rfc1459_fold(x) == rfc1459_fold(y))
            }
        }
    }
}

fn rfc1459_fold(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c.to_ascii_lowercase(),
    }
}

/// Channel-name identity.
pub fn channel_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
