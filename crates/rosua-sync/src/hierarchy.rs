//! Name hierarchy resolver.
//!
//! Entity names are slash-delimited paths.  [`split_name`] normalises a name
//! into its segments — index 0 is always the empty root segment, so segment
//! indices line up with "number of path components already materialised".
//! [`remaining_hierarchy`] concatenates everything after the last processed
//! segment into the browse label for the next node; no delimiter is
//! reinserted.

use tracing::warn;

/// Split `name` into path segments.
///
/// Names are normalised to a leading `/`, so the first segment is always the
/// empty string and plain indices can describe "how deep an ancestor already
/// exists".
pub fn split_name(name: &str) -> Vec<String> {
    let normalised = if name.starts_with('/') {
        name.to_string()
    } else {
        warn!(name, "entity name without leading slash, normalising");
        format!("/{name}")
    };
    normalised.split('/').map(str::to_string).collect()
}

/// Concatenate all segments after `index_of_last_processed`.
///
/// An index at or beyond the last segment yields an empty string — the
/// caller treats that as "nothing further to create", never as an error.
pub fn remaining_hierarchy(segments: &[String], index_of_last_processed: usize) -> String {
    let mut output = String::new();
    let mut counter = index_of_last_processed + 1;
    while counter < segments.len() {
        output.push_str(&segments[counter]);
        counter += 1;
    }
    output
}
