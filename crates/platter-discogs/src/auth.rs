// SPDX-License-Identifier: GPL-3.0-or-later

//! Authorization header providers.
//!
//! Discogs accepts either a personal access token or an OAuth 1.0a signed
//! header. The fetcher only needs the final header value for a given URL and
//! method, so both are exposed through [`Authorizer`].

use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use uuid::Uuid;

/// RFC 3986 unreserved characters stay as-is; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Computes the `Authorization` header for an outgoing request.
pub trait Authorizer: Send + Sync {
    /// `None` means the request goes out unauthenticated.
    fn authorization(&self, url: &str, method: &Method) -> Option<String>;

    /// Whether requests carry credentials, which selects the authenticated rate limit.
    fn is_authenticated(&self) -> bool {
        true
    }
}

impl<F> Authorizer for F
where
    F: Fn(&str, &Method) -> Option<String> + Send + Sync,
{
    fn authorization(&self, url: &str, method: &Method) -> Option<String> {
        self(url, method)
    }
}

/// Personal access token: `Discogs token=<value>`.
#[derive(Clone)]
pub struct UserToken {
    token: String,
}

impl UserToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }
}

impl fmt::Debug for UserToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserToken").field("token", &"<redacted>").finish()
    }
}

impl Authorizer for UserToken {
    fn authorization(&self, _url: &str, _method: &Method) -> Option<String> {
        if self.token.is_empty() {
            return None;
        }
        Some(format!("Discogs token={}", self.token))
    }

    fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}

/// OAuth 1.0a credentials signed with the PLAINTEXT method.
#[derive(Clone)]
pub struct OAuth1Plaintext {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for OAuth1Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Plaintext")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl OAuth1Plaintext {
    /// Header value with an explicit nonce and timestamp.
    pub fn header_with(&self, nonce: &str, timestamp: i64) -> String {
        let signature = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.token_secret)
        );
        let timestamp = timestamp.to_string();

        let params = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature", signature.as_str()),
            ("oauth_signature_method", "PLAINTEXT"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.token.as_str()),
            ("oauth_version", "1.0"),
        ]
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, encode(value)))
        .collect::<Vec<_>>()
        .join(", ");

        format!("OAuth {}", params)
    }
}

impl Authorizer for OAuth1Plaintext {
    fn authorization(&self, _url: &str, _method: &Method) -> Option<String> {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        Some(self.header_with(&nonce, timestamp))
    }
}

/// Credentials a client can be constructed with.
#[derive(Debug, Clone)]
pub enum Auth {
    Token(UserToken),
    OAuth(OAuth1Plaintext),
}

impl Auth {
    pub fn token(token: impl Into<String>) -> Self {
        Auth::Token(UserToken::new(token))
    }

    pub fn into_authorizer(self) -> Arc<dyn Authorizer> {
        match self {
            Auth::Token(token) => Arc::new(token),
            Auth::OAuth(oauth) => Arc::new(oauth),
        }
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuth1Plaintext {
        OAuth1Plaintext {
            consumer_key: "key".to_string(),
            consumer_secret: "sec&ret".to_string(),
            token: "tok".to_string(),
            token_secret: "toksecret".to_string(),
        }
    }

    #[test]
    fn test_user_token_header() {
        let token = UserToken::new(" abc123 ");
        assert_eq!(
            token.authorization("https://api.discogs.com/oauth/identity", &Method::GET),
            Some("Discogs token=abc123".to_string())
        );
    }

    #[test]
    fn test_blank_user_token_is_unauthenticated() {
        let token = UserToken::new("   ");
        assert_eq!(token.authorization("/", &Method::GET), None);
        assert!(!token.is_authenticated());
        assert!(UserToken::new("abc").is_authenticated());
    }

    #[test]
    fn test_oauth_plaintext_header() {
        let header = oauth().header_with("n0nce", 1_700_000_000);
        assert_eq!(
            header,
            "OAuth oauth_consumer_key=\"key\", oauth_nonce=\"n0nce\", \
             oauth_signature=\"sec%2526ret%26toksecret\", oauth_signature_method=\"PLAINTEXT\", \
             oauth_timestamp=\"1700000000\", oauth_token=\"tok\", oauth_version=\"1.0\""
        );
    }

    #[test]
    fn test_oauth_nonce_changes_per_request() {
        let auth = oauth();
        let first = auth.authorization("https://api.discogs.com/", &Method::POST);
        let second = auth.authorization("https://api.discogs.com/", &Method::POST);
        assert_ne!(first, second);
    }

    #[test]
    fn test_closure_authorizer() {
        let authorizer = |url: &str, method: &Method| Some(format!("{} {}", method, url));
        assert_eq!(
            authorizer.authorization("/x", &Method::DELETE),
            Some("DELETE /x".to_string())
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Auth::token("secret-token"));
        assert!(!debug.contains("secret-token"));
    }
}
