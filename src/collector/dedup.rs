//! Cross-file series identity tracking for one collection cycle.
//!
//! Every series gets a 64-bit content hash over its family name and its
//! label values sorted by label name. Label names are deliberately left out
//! of the hash payload: two series whose sorted-by-name label values line up
//! can collide even with different label names. Compatible consumers depend
//! on this, so the payload layout must not change.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use xxhash_rust::xxh3::Xxh3;

use crate::expfmt::Label;

/// Separates the hashed fields so adjacent values cannot run together.
const SEPARATOR: u8 = 0xFF;

/// Computes the dedup identity hash for one series.
///
/// Layout: family name, separator, then each label value in
/// sorted-by-label-name order, each followed by a separator. Computed over
/// the series' own labels, before any union padding.
pub fn series_hash(family_name: &str, labels: &[Label]) -> u64 {
    let mut sorted: Vec<&Label> = labels.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Xxh3::new();
    hasher.update(family_name.as_bytes());
    hasher.update(&[SEPARATOR]);
    for label in sorted {
        hasher.update(label.value.as_bytes());
        hasher.update(&[SEPARATOR]);
    }
    hasher.digest()
}

/// Registry of series hashes seen during one collection cycle, mapping each
/// hash to the file that first produced it.
///
/// Created empty at cycle start and discarded at cycle end. An entry is
/// never overwritten once set.
#[derive(Debug, Default)]
pub struct SeenRegistry {
    seen: HashMap<u64, PathBuf>,
}

impl SeenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a series hash for `path`, or returns the owning path if the
    /// hash was already seen.
    pub fn observe(&mut self, hash: u64, path: &Path) -> Option<&Path> {
        match self.seen.entry(hash) {
            Entry::Occupied(entry) => Some(entry.into_mut().as_path()),
            Entry::Vacant(entry) => {
                entry.insert(path.to_path_buf());
                None
            }
        }
    }
}

/// Human-readable series identifier for duplicate diagnostics.
///
/// Pairs sorted label names with independently sorted label values, so the
/// rendering is only faithful when the label set is small or simple. Good
/// enough for log lines; never used for identity.
pub fn friendly_series_string(name: &str, label_names: &[String], label_values: &[String]) -> String {
    let mut sorted_names: Vec<&String> = label_names.iter().collect();
    sorted_names.sort();
    let mut sorted_values: Vec<&String> = label_values.iter().collect();
    sorted_values.sort();

    let mut out = String::from(name);
    out.push('{');
    for (idx, (n, v)) in sorted_names.iter().zip(sorted_values.iter()).enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&format!("{}=\"{}\"", n, v));
    }
    out.push('}');
    out
}
