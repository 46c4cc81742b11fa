//! Allow-listed listing options.
//!
//! Listing endpoints accept a small fixed set of status and sort values.
//! Parsing any other string fails with [`InvalidInputError::Option`], so a
//! bad value never reaches the network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

macro_rules! allow_list {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted value, in documentation order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the wire value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            fn allowed() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| {
                        InvalidInputError::Option {
                            name: $label,
                            value: s.to_string(),
                            allowed: Self::allowed(),
                        }
                        .into()
                    })
            }
        }
    };
}

allow_list! {
    /// Deposition status filter.
    DepositionStatus, "status" {
        Draft => "draft",
        Published => "published",
    }
}

allow_list! {
    /// Sort order for the legacy deposition listing.
    DepositionSort, "sort" {
        BestMatch => "bestmatch",
        BestMatchDesc => "-bestmatch",
        MostRecent => "mostrecent",
        MostRecentDesc => "-mostrecent",
    }
}

allow_list! {
    /// Sort order for record and draft searches.
    RecordSort, "sort" {
        BestMatch => "bestmatch",
        Newest => "newest",
        Oldest => "oldest",
        UpdatedDesc => "updated-desc",
        UpdatedAsc => "updated-asc",
        Version => "version",
        MostViewed => "mostviewed",
        MostDownloaded => "mostdownloaded",
    }
}
