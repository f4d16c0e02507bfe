//! Shared utility functions for owl-gaia.
//!
//! Text cleanup for scraped pages and helpers for tool inputs that can be
//! either local paths or remote urls.

pub mod fetch;
pub mod text;

pub use fetch::{cache_file_name, extension_of, fetch_bytes, fetch_text, is_url, resolve_local};
pub use text::{decode_entities, html_to_text, truncate_chars};
