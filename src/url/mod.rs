//! URL handling module for wiki-digest
//!
//! Document identity is the normalized URL; every URL entering the store goes
//! through [`normalize_url`] first.

mod normalize;

pub use normalize::normalize_url;

use crate::UrlError;

/// Normalizes a URL and returns it as the string stored in the document table
pub fn document_key(url_str: &str) -> Result<String, UrlError> {
    normalize_url(url_str).map(String::from)
}
