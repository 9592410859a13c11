//! On-disk layout: `<root>/<store_name>/{.ledger, .store.lock, events/, Indices/{EventType,Tags}/}`.
//!
//! See `SPEC_FULL.md` §6 for the authoritative layout diagram.

use std::path::{Path, PathBuf};

/// Event files are zero-padded to this width so a directory listing sorts
/// naturally by position.
pub const POSITION_WIDTH: usize = 10;

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Replaces characters illegal in filesystem names with `_`.
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// The store's root directory: `<root>/<store_name>`.
pub fn store_dir(root_path: &Path, store_name: &str) -> PathBuf {
    root_path.join(store_name)
}

pub fn ledger_path(store_dir: &Path) -> PathBuf {
    store_dir.join(".ledger")
}

pub fn lock_path(store_dir: &Path) -> PathBuf {
    store_dir.join(".store.lock")
}

pub fn events_dir(store_dir: &Path) -> PathBuf {
    store_dir.join("events")
}

pub fn event_type_index_dir(store_dir: &Path) -> PathBuf {
    store_dir.join("Indices").join("EventType")
}

pub fn tag_index_dir(store_dir: &Path) -> PathBuf {
    store_dir.join("Indices").join("Tags")
}

/// The fixed-width, zero-padded file name for an event at `position`
/// (without extension), e.g. position 42 -> `"0000000042"`.
pub fn position_file_stem(position: u64) -> String {
    format!("{position:0width$}", width = POSITION_WIDTH)
}

pub fn event_file_path(store_dir: &Path, position: u64) -> PathBuf {
    events_dir(store_dir).join(format!("{}.json", position_file_stem(position)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_illegal_characters() {
        assert_eq!(sanitize_segment("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_segment("plain"), "plain");
    }

    #[test]
    fn position_file_stem_is_fixed_width() {
        assert_eq!(position_file_stem(1), "0000000001");
        assert_eq!(position_file_stem(1_234_567_890), "1234567890");
    }
}
