use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseOptionError;

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id_newtype!(DocumentId);
string_id_newtype!(ChatId);

/// Declares a wire enum whose variants serialize as fixed lowercase tokens and
/// parse back from the same tokens.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseOptionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($token => Ok($name::$variant),)+
                    other => Err(ParseOptionError::new(stringify!($name), other)),
                }
            }
        }
    };
}

wire_enum!(
    /// Target length of a generated summary.
    SummaryLength {
        Breve => "breve",
        Medio => "medio",
        Dettagliato => "dettagliato",
    }
);

wire_enum!(
    AccuracyLevel {
        Standard => "standard",
        Alta => "alta",
    }
);

wire_enum!(
    /// Layout of a generated schema: mind map or flow chart.
    SchemaType {
        Brainstorming => "brainstorming",
        Cascata => "cascata",
    }
);

wire_enum!(
    /// Which part of a document an exported PDF contains.
    ExportContent {
        Full => "full",
        Summary => "summary",
        Schema => "schema",
    }
);

wire_enum!(
    ChatRole {
        User => "user",
        Assistant => "assistant",
        Error => "error",
    }
);

wire_enum!(
    Theme {
        Light => "light",
        Dark => "dark",
    }
);

impl Default for SummaryLength {
    fn default() -> Self {
        Self::Medio
    }
}

impl Default for AccuracyLevel {
    fn default() -> Self {
        Self::Standard
    }
}

impl Default for SchemaType {
    fn default() -> Self {
        Self::Brainstorming
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::Light
    }
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }

    pub fn toggled(self) -> Self {
        Self::from_dark_mode(!self.is_dark())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub length: SummaryLength,
    pub accuracy: AccuracyLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaOptions {
    pub schema_type: SchemaType,
}
