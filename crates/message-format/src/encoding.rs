//! Display Encodings

use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How payload bytes are rendered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DisplayEncoding {
    /// 7-bit text; bytes above 0x7F render as `?`
    #[default]
    Ascii,
    /// Space-separated uppercase byte pairs
    Hex,
    /// UTF-8 text with invalid sequences replaced
    Utf8,
}

impl DisplayEncoding {
    /// Every supported encoding, in selector order
    pub const ALL: [DisplayEncoding; 3] = [
        DisplayEncoding::Ascii,
        DisplayEncoding::Hex,
        DisplayEncoding::Utf8,
    ];

    /// Display name used by selectors and settings files
    pub fn name(self) -> &'static str {
        match self {
            DisplayEncoding::Ascii => "ASCII",
            DisplayEncoding::Hex => "HEX",
            DisplayEncoding::Utf8 => "UTF8",
        }
    }

    /// Numeric selector code
    pub fn code(self) -> u8 {
        match self {
            DisplayEncoding::Ascii => 0,
            DisplayEncoding::Hex => 1,
            DisplayEncoding::Utf8 => 2,
        }
    }
}

impl fmt::Display for DisplayEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisplayEncoding {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASCII" => Ok(DisplayEncoding::Ascii),
            "HEX" => Ok(DisplayEncoding::Hex),
            "UTF8" | "UTF-8" => Ok(DisplayEncoding::Utf8),
            _ => Err(FormatError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl TryFrom<u8> for DisplayEncoding {
    type Error = FormatError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DisplayEncoding::Ascii),
            1 => Ok(DisplayEncoding::Hex),
            2 => Ok(DisplayEncoding::Utf8),
            other => Err(FormatError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl TryFrom<String> for DisplayEncoding {
    type Error = FormatError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<DisplayEncoding> for String {
    fn from(encoding: DisplayEncoding) -> Self {
        encoding.name().to_string()
    }
}
