// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::constants::Currency;
use crate::pagination::PageItems;

/// The authenticated user, as returned by `/oauth/identity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: u64,
    pub username: String,
    pub resource_url: String,
    /// Name of the application the token belongs to.
    #[serde(default)]
    pub consumer_name: Option<String>,
}

/// Public profile of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub resource_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub home_page: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    /// Marketplace currency preference.
    #[serde(default)]
    pub curr_abbr: Option<Currency>,
    #[serde(default)]
    pub num_collection: Option<u64>,
    #[serde(default)]
    pub num_wantlist: Option<u64>,
}

/// Fields accepted when editing a profile. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProfileEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Sent to Discogs as `curr_abbr`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

/// Reference to an artist embedded in other resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistRef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub resource_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
    #[serde(default)]
    pub uri150: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    /// Lowest marketplace price, in the requested currency.
    #[serde(default)]
    pub lowest_price: Option<f64>,
    #[serde(default)]
    pub num_for_sale: Option<u32>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Release or master credited to an artist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistRelease {
    pub id: u64,
    pub title: String,
    /// `release` or `master`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistReleases {
    pub releases: Vec<ArtistRelease>,
}

impl PageItems for ArtistReleases {
    type Item = ArtistRelease;

    fn into_items(self) -> Vec<ArtistRelease> {
        self.releases
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterVersion {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub catno: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub released: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterVersions {
    pub versions: Vec<MasterVersion>,
}

impl PageItems for MasterVersions {
    type Item = MasterVersion;

    fn into_items(self) -> Vec<MasterVersion> {
        self.versions
    }
}

/// Database search filters. `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub kind: Option<crate::constants::SearchType>,
    pub title: Option<String>,
    pub release_title: Option<String>,
    pub credit: Option<String>,
    pub artist: Option<String>,
    pub anv: Option<String>,
    pub label: Option<String>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub country: Option<String>,
    pub year: Option<String>,
    pub format: Option<String>,
    pub catno: Option<String>,
    pub barcode: Option<String>,
    pub track: Option<String>,
    pub submitter: Option<String>,
    pub contributor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub resource_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
}

impl PageItems for SearchResults {
    type Item = SearchResult;

    fn into_items(self) -> Vec<SearchResult> {
        self.results
    }
}

/// Minimal release data embedded in wantlist and collection entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasicInformation {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Want {
    pub id: u64,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub resource_url: Option<String>,
    pub basic_information: BasicInformation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wantlist {
    pub wants: Vec<Want>,
}

impl PageItems for Wantlist {
    type Item = Want;

    fn into_items(self) -> Vec<Want> {
        self.wants
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub value: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRelease {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: u64,
    pub status: String,
    pub price: Price,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub sleeve_condition: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    pub release: ListingRelease,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    pub listings: Vec<Listing>,
}

impl PageItems for Inventory {
    type Item = Listing;

    fn into_items(self) -> Vec<Listing> {
        self.listings
    }
}

/// A requested inventory export and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportItem {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_ts: Option<String>,
    #[serde(default)]
    pub finished_ts: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryExports {
    pub items: Vec<ExportItem>,
}

impl PageItems for InventoryExports {
    type Item = ExportItem;

    fn into_items(self) -> Vec<ExportItem> {
        self.items
    }
}
