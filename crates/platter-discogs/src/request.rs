// SPDX-License-Identifier: GPL-3.0-or-later

//! Shaping of outgoing query strings and JSON bodies.

use std::fmt::Display;

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::constants::SortOrder;

/// Ordered query parameters. Keys whose value is `None` are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, Option<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.push(key, Some(value.to_string()));
        self
    }

    pub fn insert_opt<V: Display>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.push(key, value.map(|value| value.to_string()));
        self
    }

    /// Set `key`, replacing any earlier entry with the same name.
    pub fn push(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.pairs.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Merge `other` into `self`; later keys win.
    pub fn extend(mut self, other: QueryParams) -> Self {
        for (key, value) in other.pairs {
            self.push(key, value);
        }
        self
    }

    /// Entries that will actually be sent.
    pub fn defined(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|value| (key.as_str(), value)))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.defined()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.defined().next().is_none()
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.defined() {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

/// Sort key and direction for listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOptions<T> {
    pub by: Option<T>,
    pub order: Option<SortOrder>,
}

impl<T> Default for SortOptions<T> {
    fn default() -> Self {
        Self {
            by: None,
            order: None,
        }
    }
}

impl<T> SortOptions<T> {
    pub fn by(by: T) -> Self {
        Self {
            by: Some(by),
            order: None,
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }
}

/// `sort` / `sort_order` parameters, falling back to `default` ascending.
pub fn sort_by<T: Display + Copy>(default: T, options: Option<&SortOptions<T>>) -> QueryParams {
    let by = options.and_then(|options| options.by).unwrap_or(default);
    let order = options
        .and_then(|options| options.order)
        .unwrap_or(SortOrder::Asc);

    QueryParams::new()
        .insert("sort", by)
        .insert("sort_order", order)
}

/// Rewrite a request body into the key convention Discogs expects.
///
/// Every object key at any depth is converted from camelCase to snake_case,
/// except `currency`, which Discogs calls `curr_abbr`.
pub fn transform_body(body: Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (transform_key(&key), transform_body(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(transform_body).collect()),
        other => other,
    }
}

pub fn transform_key(key: &str) -> String {
    if key == "currency" {
        return "curr_abbr".to_string();
    }

    let mut snake = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            snake.push('_');
            snake.push(ch.to_ascii_lowercase());
        } else {
            snake.push(ch);
        }
    }
    snake
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ReleaseSort;
    use serde_json::json;

    #[test]
    fn test_query_drops_undefined_values() {
        let query = QueryParams::new()
            .insert("page", 2)
            .insert_opt("currency", None::<String>)
            .insert_opt("notes", Some("first press"));

        let serialized = query.to_query_string();
        assert_eq!(serialized, "page=2&notes=first+press");

        let parsed: Vec<(String, String)> = form_urlencoded::parse(serialized.as_bytes())
            .into_owned()
            .collect();
        assert!(parsed.iter().all(|(key, _)| key != "currency"));
    }

    #[test]
    fn test_query_only_undefined_is_empty() {
        let query = QueryParams::new().insert_opt("rating", None::<u8>);
        assert!(query.is_empty());
        assert_eq!(query.to_query_string(), "");
    }

    #[test]
    fn test_query_later_keys_win() {
        let query = QueryParams::new()
            .insert("page", 1)
            .extend(QueryParams::new().insert("page", 3));
        assert_eq!(query.get("page"), Some("3"));
        assert_eq!(query.to_query_string(), "page=3");
    }

    #[test]
    fn test_sort_by_defaults() {
        let query = sort_by(ReleaseSort::Year, None);
        assert_eq!(query.get("sort"), Some("year"));
        assert_eq!(query.get("sort_order"), Some("asc"));

        let options = SortOptions::by(ReleaseSort::Title).order(SortOrder::Desc);
        let query = sort_by(ReleaseSort::Year, Some(&options));
        assert_eq!(query.get("sort"), Some("title"));
        assert_eq!(query.get("sort_order"), Some("desc"));
    }

    #[test]
    fn test_transform_body_renames_currency() {
        let body = transform_body(json!({ "currency": "EUR", "price": 10.5 }));
        assert_eq!(body, json!({ "curr_abbr": "EUR", "price": 10.5 }));
    }

    #[test]
    fn test_transform_body_snake_cases_keys() {
        let body = transform_body(json!({
            "releaseId": 1,
            "sleeveCondition": "Generic",
            "allowOffers": true,
            "already_snake": "x"
        }));
        assert_eq!(
            body,
            json!({
                "release_id": 1,
                "sleeve_condition": "Generic",
                "allow_offers": true,
                "already_snake": "x"
            })
        );
    }

    #[test]
    fn test_transform_body_is_recursive() {
        let body = transform_body(json!({
            "shipping": { "currency": "USD", "shippingMethod": "post" },
            "items": [{ "formatQuantity": 2 }]
        }));
        assert_eq!(
            body,
            json!({
                "shipping": { "curr_abbr": "USD", "shipping_method": "post" },
                "items": [{ "format_quantity": 2 }]
            })
        );
    }

    #[test]
    fn test_transform_key() {
        assert_eq!(transform_key("homePage"), "home_page");
        assert_eq!(transform_key("currAbbr"), "curr_abbr");
        assert_eq!(transform_key("currency"), "curr_abbr");
        assert_eq!(transform_key("name"), "name");
    }
}
