//! Remote locators and resource keys
//!
//! A locator is either a provider-native reference (`gs://bucket/object`)
//! or an HTTP(S) URL. Download URLs of the form
//! `https://host/v0/b/<bucket>/o/<object>?alt=media&token=...` are also
//! translated to a native reference, so they are served by the structured
//! client and both spellings deduplicate onto one resource key.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{TransferError, TransferResult};
use crate::storage::ObjectRef;

/// Scheme used for references recovered from download URLs
const DOWNLOAD_URL_SCHEME: &str = "gs";

/// Scheme used when a generic URL is read as a path-style bucket address
const PATH_STYLE_SCHEME: &str = "s3";

/// Normalized identifier used to deduplicate concurrent fetches
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed remote locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Provider-native reference, served by the structured client only
    Native(ObjectRef),
    /// HTTP(S) resource; `object` is set when the URL encodes a bucket path
    Http { url: Url, object: Option<ObjectRef> },
}

impl Locator {
    pub fn parse(raw: &str) -> TransferResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TransferError::MalformedLocator("empty locator".to_string()));
        }

        if let Some((scheme, _)) = raw.split_once("://") {
            if ObjectRef::is_native_scheme(scheme) {
                return ObjectRef::parse(raw)
                    .map(Locator::Native)
                    .ok_or_else(|| TransferError::MalformedLocator(raw.to_string()));
            }
        }

        let url = Url::parse(raw)
            .map_err(|e| TransferError::MalformedLocator(format!("{}: {}", raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(TransferError::MalformedLocator(raw.to_string()));
        }

        let object = object_from_download_url(&url);
        Ok(Locator::Http { url, object })
    }

    /// Reference usable by the structured client, if any
    pub fn object_ref(&self) -> Option<&ObjectRef> {
        match self {
            Locator::Native(object) => Some(object),
            Locator::Http { object, .. } => object.as_ref(),
        }
    }

    /// Reference tried once by the fallback transport.
    ///
    /// Generic URLs are read path-style (`/<bucket>/<object>`); `None` when
    /// the path has no object part.
    pub fn fallback_object(&self) -> Option<ObjectRef> {
        match self {
            Locator::Native(object) => Some(object.clone()),
            Locator::Http {
                object: Some(object),
                ..
            } => Some(object.clone()),
            Locator::Http { url, object: None } => object_from_path_style(url),
        }
    }

    pub fn key(&self) -> ResourceKey {
        match self {
            Locator::Native(object) => ResourceKey(object.to_string()),
            Locator::Http {
                object: Some(object),
                ..
            } => ResourceKey(object.to_string()),
            Locator::Http { url, object: None } => {
                let mut url = url.clone();
                url.set_fragment(None);
                ResourceKey(url.to_string())
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Native(object) => write!(f, "{}", object),
            Locator::Http { url, .. } => write!(f, "{}", url),
        }
    }
}

/// Recover `bucket` and `object` from `/v0/b/<bucket>/o/<object>`, ignoring the query
fn object_from_download_url(url: &Url) -> Option<ObjectRef> {
    let rest = url.path().strip_prefix("/v0/b/")?;
    let (bucket, encoded) = rest.split_once("/o/")?;
    if bucket.is_empty() || encoded.is_empty() {
        return None;
    }

    let bucket = urlencoding::decode(bucket).ok()?;
    let key = urlencoding::decode(encoded).ok()?;
    Some(ObjectRef::new(DOWNLOAD_URL_SCHEME, &bucket, &key))
}

fn object_from_path_style(url: &Url) -> Option<ObjectRef> {
    let path = url.path().trim_start_matches('/');
    let (bucket, encoded) = path.split_once('/')?;
    if bucket.is_empty() || encoded.is_empty() {
        return None;
    }

    let bucket = urlencoding::decode(bucket).ok()?;
    let key = urlencoding::decode(encoded).ok()?;
    Some(ObjectRef::new(PATH_STYLE_SCHEME, &bucket, &key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_locator() {
        let locator = Locator::parse("gs://bucket/book.pdf").unwrap();
        assert!(matches!(locator, Locator::Native(_)));
        assert_eq!(locator.key().as_str(), "gs://bucket/book.pdf");
    }

    #[test]
    fn test_download_url_translates_to_native_key() {
        let locator = Locator::parse(
            "https://firebasestorage.googleapis.com/v0/b/bucket/o/books%2Fdune.pdf?alt=media&token=abc",
        )
        .unwrap();

        let object = locator.object_ref().unwrap();
        assert_eq!(object.bucket, "bucket");
        assert_eq!(object.key, "books/dune.pdf");
        assert_eq!(
            locator.key(),
            Locator::parse("gs://bucket/books/dune.pdf").unwrap().key()
        );
    }

    #[test]
    fn test_generic_url_key_drops_fragment() {
        let a = Locator::parse("https://Example.com/files/a.pdf#page=3").unwrap();
        let b = Locator::parse("https://example.com/files/a.pdf").unwrap();
        assert!(a.object_ref().is_none());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_fallback_object_for_generic_urls() {
        let path_style = Locator::parse("https://storage.example.com/media/books/a%20b.pdf?x=1").unwrap();
        let object = path_style.fallback_object().unwrap();
        assert_eq!(object.bucket, "media");
        assert_eq!(object.key, "books/a b.pdf");
        assert!(path_style.object_ref().is_none());

        let bare = Locator::parse("https://example.com/a.pdf").unwrap();
        assert!(bare.fallback_object().is_none());

        let native = Locator::parse("gs://bucket/book.pdf").unwrap();
        assert_eq!(native.fallback_object().as_ref(), native.object_ref());
    }

    #[test]
    fn test_malformed_locators() {
        for raw in ["", "   ", "gs://bucket", "ftp://host/file", "not a url"] {
            assert!(
                matches!(Locator::parse(raw), Err(TransferError::MalformedLocator(_))),
                "expected malformed: {:?}",
                raw
            );
        }
    }
}
