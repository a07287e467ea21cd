//! Metric label derivation.
//!
//! Prometheus label values may be anything, but the host label doubles as a
//! stable series key, so it is reduced to ASCII letters and underscores.

use std::sync::OnceLock;

use regex::Regex;

/// Replace every maximal run of characters outside `[A-Za-z_]` with one `_`.
///
/// Total over any input, including the empty string.
///
/// # Examples
///
/// ```
/// use extmon::probe::sanitize;
///
/// assert_eq!(sanitize("a.b.c"), "a_b_c");
/// assert_eq!(sanitize("api.example.com:8443"), "api_example_com_");
/// ```
pub fn sanitize(host: &str) -> String {
    static INVALID_CHARACTERS: OnceLock<Regex> = OnceLock::new();

    let regex = INVALID_CHARACTERS
        .get_or_init(|| Regex::new(r"[^A-Z_a-z]+").expect("failed to compile label regex"));

    regex.replace_all(host, "_").into_owned()
}
