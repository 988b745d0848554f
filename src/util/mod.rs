//! Leaf utilities shared by the feed pipeline.
//!
//! - **URL validation**: normalization and the SSRF gate applied before any fetch
//! - **Dates**: multi-layout timestamp parsing for RSS and Atom dates
//! - **Text**: HTML-to-plain-text and control character stripping

mod date;
mod text;
mod url_validator;

pub use date::{parse_date, parse_date_or_now};
pub use text::{strip_control_chars, strip_html};
pub use url_validator::{normalize_url, validate_url, UrlValidationError};
