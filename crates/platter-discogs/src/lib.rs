// SPDX-License-Identifier: GPL-3.0-or-later

//! Discogs API client.
//!
//! Every call goes through one [`Fetcher`], which paces requests with an
//! adaptive rate limiter (Discogs reports its real limit in response
//! headers), attaches authentication, shapes query strings and bodies the way
//! Discogs expects, and maps HTTP failures onto [`DiscogsError`]. Listing
//! endpoints can be walked lazily with [`pagination::all_pages`].

pub mod auth;
pub mod cache;
pub mod client;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod pagination;
pub mod rate_limiter;
pub mod request;

pub use auth::{Auth, Authorizer, OAuth1Plaintext, UserToken};
pub use cache::{CacheKey, MemoryCache, ResponseCache};
pub use client::DiscogsClient;
pub use constants::{Currency, OutputFormat, SortOrder};
pub use error::{DiscogsError, Result};
pub use fetcher::{EmptyResponse, Fetcher, FetcherBuilder, Payload};
pub use pagination::{all_pages, concat_pages, paginate, Page, PageParams, Pagination};
pub use rate_limiter::{RateLimitSnapshot, RateLimiter, RateLimiterConfig};
pub use request::{sort_by, transform_body, QueryParams, SortOptions};
