//! Local-library track addressing
//!
//! Mopidy addresses local files as `local:track:` plus the URL-quoted path
//! relative to its media directory, with `/` kept as the separator.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Player URI for a library-relative, `/`-separated path
pub fn track_uri(relative_path: &str) -> String {
    format!("local:track:{}", utf8_percent_encode(relative_path, PATH_SEGMENT))
}
