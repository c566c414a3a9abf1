// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::auth::Auth;
use crate::constants::{Currency, InventorySort, InventoryStatus, ReleaseSort};
use crate::error::{DiscogsError, Result};
use crate::fetcher::{EmptyResponse, Fetcher, FetcherBuilder};
use crate::models::{
    Artist, ArtistReleases, ExportItem, Identity, Inventory, InventoryExports, MasterVersions,
    ProfileEdit, Release, SearchOptions, SearchResults, UserProfile, Want, Wantlist,
};
use crate::pagination::{all_pages, paginate, Page, Pagination};
use crate::request::{sort_by, QueryParams, SortOptions};

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Highest rating Discogs accepts on a wantlist entry.
pub const MAX_RATING: u8 = 5;

/// Typed access to the Discogs endpoints used by platter.
///
/// Cloning is cheap; clones share one [`Fetcher`] and therefore one rate limit.
#[derive(Debug, Clone)]
pub struct DiscogsClient {
    fetcher: Arc<Fetcher>,
}

impl From<Fetcher> for DiscogsClient {
    fn from(fetcher: Fetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }
}

impl DiscogsClient {
    /// Client with default settings, optionally authenticated.
    ///
    /// # Example
    /// ```no_run
    /// # use platter_discogs::{Auth, DiscogsClient};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = DiscogsClient::new(Some(Auth::token("my-token")))?;
    /// let me = client.identity().await?;
    /// println!("{}", me.username);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(auth: Option<Auth>) -> Result<Self> {
        let builder = Self::builder();
        let builder = match auth {
            Some(auth) => builder.auth(auth),
            None => builder,
        };
        builder.build_client()
    }

    pub fn builder() -> FetcherBuilder {
        Fetcher::builder()
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    #[instrument(skip(self))]
    pub async fn identity(&self) -> Result<Identity> {
        self.fetcher.get("/oauth/identity", None).await
    }

    pub async fn profile(&self, username: &str) -> Result<UserProfile> {
        self.fetcher
            .get(&format!("/users/{}", segment(username)), None)
            .await
    }

    /// Update profile fields. Only the fields set in `edit` are sent.
    #[instrument(skip(self, edit))]
    pub async fn edit_profile(&self, username: &str, edit: &ProfileEdit) -> Result<UserProfile> {
        let mut body = serde_json::to_value(edit)?;
        if let Value::Object(fields) = &mut body {
            fields.insert("username".to_string(), Value::String(username.to_string()));
        }

        self.fetcher
            .schedule(
                &format!("/users/{}", segment(username)),
                None,
                Method::POST,
                Some(body),
            )
            .await
    }

    /// Look up a release, with marketplace prices in `currency` if given.
    #[instrument(skip(self))]
    pub async fn release(&self, release_id: u64, currency: Option<Currency>) -> Result<Release> {
        let query = QueryParams::new().insert_opt("curr_abbr", currency);
        self.fetcher
            .get(&format!("/releases/{}", release_id), Some(&query))
            .await
    }

    #[instrument(skip(self))]
    pub async fn artist(&self, artist_id: u64) -> Result<Artist> {
        self.fetcher
            .get(&format!("/artists/{}", artist_id), None)
            .await
    }

    /// Releases and masters credited to an artist, sorted by year unless told otherwise.
    pub async fn artist_releases(
        &self,
        artist_id: u64,
        sort: Option<SortOptions<ReleaseSort>>,
        pagination: Option<Pagination>,
    ) -> Result<Page<ArtistReleases>> {
        let query = sort_by(ReleaseSort::Year, sort.as_ref()).extend(paginate(pagination).to_query());
        self.fetcher
            .get(&format!("/artists/{}/releases", artist_id), Some(&query))
            .await
    }

    pub async fn master_versions(
        &self,
        master_id: u64,
        pagination: Option<Pagination>,
    ) -> Result<Page<MasterVersions>> {
        let query = paginate(pagination).to_query();
        self.fetcher
            .get(&format!("/masters/{}/versions", master_id), Some(&query))
            .await
    }

    /// Search the database. Discogs requires an authenticated client for this.
    #[instrument(skip(self, options))]
    pub async fn search(
        &self,
        options: &SearchOptions,
        pagination: Option<Pagination>,
    ) -> Result<Page<SearchResults>> {
        let query = search_query(options).extend(paginate(pagination).to_query());
        self.fetcher.get("/database/search", Some(&query)).await
    }

    pub async fn wantlist_for_user(
        &self,
        username: &str,
        pagination: Option<Pagination>,
    ) -> Result<Page<Wantlist>> {
        let query = paginate(pagination).to_query();
        self.fetcher
            .get(&format!("/users/{}/wants", segment(username)), Some(&query))
            .await
    }

    /// Add a release to a wantlist. `rating` must be between 0 and 5.
    #[instrument(skip(self, notes))]
    pub async fn add_to_wantlist(
        &self,
        username: &str,
        release_id: u64,
        notes: Option<&str>,
        rating: Option<u8>,
    ) -> Result<Want> {
        if let Some(rating) = rating.filter(|rating| *rating > MAX_RATING) {
            return Err(DiscogsError::Configuration(format!(
                "rating must be between 0 and {}, got {}",
                MAX_RATING, rating
            )));
        }

        let query = QueryParams::new()
            .insert_opt("notes", notes)
            .insert_opt("rating", rating);
        self.fetcher
            .schedule(
                &format!("/users/{}/wants/{}", segment(username), release_id),
                Some(&query),
                Method::PUT,
                None,
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_from_wantlist(&self, username: &str, release_id: u64) -> Result<()> {
        let _: EmptyResponse = self
            .fetcher
            .schedule(
                &format!("/users/{}/wants/{}", segment(username), release_id),
                None,
                Method::DELETE,
                None,
            )
            .await?;
        debug!(target: "discogs", username, release_id, "removed from wantlist");
        Ok(())
    }

    /// A seller's listings. `status` defaults to all, sorting to listing date.
    pub async fn inventory_for_user(
        &self,
        username: &str,
        status: Option<InventoryStatus>,
        sort: Option<SortOptions<InventorySort>>,
        pagination: Option<Pagination>,
    ) -> Result<Page<Inventory>> {
        let query = QueryParams::new()
            .insert("status", status.unwrap_or(InventoryStatus::All))
            .extend(sort_by(InventorySort::Listed, sort.as_ref()))
            .extend(paginate(pagination).to_query());
        self.fetcher
            .get(&format!("/users/{}/inventory", segment(username)), Some(&query))
            .await
    }

    /// Ask Discogs to prepare a CSV export of the authenticated user's inventory.
    pub async fn request_inventory_export(&self) -> Result<()> {
        let _: EmptyResponse = self
            .fetcher
            .schedule("/inventory/export", None, Method::POST, None)
            .await?;
        Ok(())
    }

    pub async fn inventory_exports(
        &self,
        pagination: Option<Pagination>,
    ) -> Result<Page<InventoryExports>> {
        let query = paginate(pagination).to_query();
        self.fetcher.get("/inventory/export", Some(&query)).await
    }

    pub async fn inventory_export(&self, export_id: u64) -> Result<ExportItem> {
        self.fetcher
            .get(&format!("/inventory/export/{}", export_id), None)
            .await
    }

    /// Raw CSV of a finished export.
    #[instrument(skip(self))]
    pub async fn download_inventory_export(&self, export_id: u64) -> Result<Bytes> {
        self.fetcher
            .schedule_bytes(
                &format!("/inventory/export/{}/download", export_id),
                None,
                Method::GET,
            )
            .await
    }

    /// Download an image given its full URL on the image host.
    #[instrument(skip(self))]
    pub async fn image(&self, url: &str) -> Result<Bytes> {
        self.fetcher.schedule_bytes(url, None, Method::GET).await
    }

    /// Every page of an artist's releases, fetched as the stream is polled.
    pub fn all_artist_releases(
        &self,
        artist_id: u64,
        sort: Option<SortOptions<ReleaseSort>>,
    ) -> impl Stream<Item = Result<ArtistReleases>> + '_ {
        all_pages(move |params| self.artist_releases(artist_id, sort, Some(params.into())))
    }

    pub fn all_master_versions(
        &self,
        master_id: u64,
    ) -> impl Stream<Item = Result<MasterVersions>> + '_ {
        all_pages(move |params| self.master_versions(master_id, Some(params.into())))
    }

    pub fn all_wantlist<'a>(
        &'a self,
        username: &'a str,
    ) -> impl Stream<Item = Result<Wantlist>> + 'a {
        all_pages(move |params| self.wantlist_for_user(username, Some(params.into())))
    }

    pub fn all_inventory<'a>(
        &'a self,
        username: &'a str,
        status: Option<InventoryStatus>,
        sort: Option<SortOptions<InventorySort>>,
    ) -> impl Stream<Item = Result<Inventory>> + 'a {
        all_pages(move |params| self.inventory_for_user(username, status, sort, Some(params.into())))
    }

    pub fn all_inventory_exports(&self) -> impl Stream<Item = Result<InventoryExports>> + '_ {
        all_pages(move |params| self.inventory_exports(Some(params.into())))
    }
}

impl FetcherBuilder {
    /// Build the fetcher and wrap it in a [`DiscogsClient`].
    pub fn build_client(self) -> Result<DiscogsClient> {
        self.build().map(DiscogsClient::from)
    }
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

fn search_query(options: &SearchOptions) -> QueryParams {
    QueryParams::new()
        .insert_opt("q", options.query.as_deref())
        .insert_opt("type", options.kind)
        .insert_opt("title", options.title.as_deref())
        .insert_opt("release_title", options.release_title.as_deref())
        .insert_opt("credit", options.credit.as_deref())
        .insert_opt("artist", options.artist.as_deref())
        .insert_opt("anv", options.anv.as_deref())
        .insert_opt("label", options.label.as_deref())
        .insert_opt("genre", options.genre.as_deref())
        .insert_opt("style", options.style.as_deref())
        .insert_opt("country", options.country.as_deref())
        .insert_opt("year", options.year.as_deref())
        .insert_opt("format", options.format.as_deref())
        .insert_opt("catno", options.catno.as_deref())
        .insert_opt("barcode", options.barcode.as_deref())
        .insert_opt("track", options.track.as_deref())
        .insert_opt("submitter", options.submitter.as_deref())
        .insert_opt("contributor", options.contributor.as_deref())
}
