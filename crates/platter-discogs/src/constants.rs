// SPDX-License-Identifier: GPL-3.0-or-later

//! Enumerations Discogs expects as fixed wire strings.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const API_BASE_URL: &str = "https://api.discogs.com";
pub const IMAGE_BASE_URL: &str = "https://img.discogs.com";
pub const API_VERSION: &str = "v2";
pub const DEFAULT_USER_AGENT: &str = concat!("platter/", env!("CARGO_PKG_VERSION"));

/// Declares an enum whose variants map one-to-one onto Discogs strings.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Response representation requested through the `Accept` header.
    OutputFormat {
        Discogs => "discogs",
    }
);

wire_enum!(
    /// Currencies accepted by the marketplace.
    Currency {
        Usd => "USD",
        Gbp => "GBP",
        Eur => "EUR",
        Cad => "CAD",
        Aud => "AUD",
        Jpy => "JPY",
        Chf => "CHF",
        Mxn => "MXN",
        Brl => "BRL",
        Nzd => "NZD",
        Sek => "SEK",
        Zar => "ZAR",
    }
);

wire_enum!(
    ReleaseCondition {
        Mint => "Mint (M)",
        NearMint => "Near Mint (NM or M-)",
        VeryGoodPlus => "Very Good Plus (VG+)",
        VeryGood => "Very Good (VG)",
        GoodPlus => "Good Plus (G+)",
        Good => "Good (G)",
        Fair => "Fair (F)",
        Poor => "Poor (P)",
    }
);

wire_enum!(
    SleeveCondition {
        Mint => "Mint (M)",
        NearMint => "Near Mint (NM or M-)",
        VeryGoodPlus => "Very Good Plus (VG+)",
        VeryGood => "Very Good (VG)",
        GoodPlus => "Good Plus (G+)",
        Good => "Good (G)",
        Fair => "Fair (F)",
        Poor => "Poor (P)",
        Generic => "Generic",
        NotGraded => "Not Graded",
        NoCover => "No Cover",
    }
);

wire_enum!(
    SearchType {
        Release => "release",
        Master => "master",
        Artist => "artist",
        Label => "label",
    }
);

wire_enum!(
    SortOrder {
        Asc => "asc",
        Desc => "desc",
    }
);

wire_enum!(
    /// Sort keys for an artist's releases.
    ReleaseSort {
        Year => "year",
        Title => "title",
        Format => "format",
    }
);

wire_enum!(
    InventorySort {
        Listed => "listed",
        Price => "price",
        Item => "item",
        Artist => "artist",
        Label => "label",
        Catno => "catno",
        Audio => "audio",
        Status => "status",
        Location => "location",
    }
);

wire_enum!(
    InventoryStatus {
        All => "All",
        Deleted => "Deleted",
        Draft => "Draft",
        Expired => "Expired",
        ForSale => "For Sale",
        Sold => "Sold",
        Suspended => "Suspended",
        Violation => "Violation",
    }
);

pub fn supported_currencies() -> &'static [Currency] {
    Currency::ALL
}

pub fn release_conditions() -> &'static [ReleaseCondition] {
    ReleaseCondition::ALL
}

pub fn sleeve_conditions() -> &'static [SleeveCondition] {
    SleeveCondition::ALL
}
