//! Text filters applied to documents before they are shown to users.

/// A filter transforms a whole document.
pub type Filter = fn(&str) -> String;

/// Runs `input` through all `filters`, in order.
///
/// ```
/// use dubbo_manifest::filter::{apply_filters, strip_license_header, trim_whitespace};
///
/// let shown = apply_filters(
///     "# Licensed under the Apache License\n\nspec:\n  profile: demo\n",
///     &[strip_license_header, trim_whitespace],
/// );
/// assert_eq!(shown, "spec:\n  profile: demo");
/// ```
pub fn apply_filters(input: &str, filters: &[Filter]) -> String {
    filters
        .iter()
        .fold(input.to_owned(), |document, filter| filter(&document))
}

/// Removes the leading block of `#` comment lines.
pub fn strip_license_header(input: &str) -> String {
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if !line.starts_with('#') {
            break;
        }
        offset += line.len();
    }
    input[offset..].to_owned()
}

pub fn trim_whitespace(input: &str) -> String {
    input.trim().to_owned()
}
