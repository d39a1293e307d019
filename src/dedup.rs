use fxhash::FxHashMap;

use crate::backend::checksum_of;

/// Filters `candidates` down to those not already present in
/// `sent_changes`, using a checksum-indexed map to avoid the O(n*m)
/// behaviour of comparing every candidate against every previously sent
/// change (spec §4.6). Full-byte comparison only happens on checksum
/// collisions.
pub fn deduplicate<'a>(sent_changes: &[Vec<u8>], candidates: Vec<&'a [u8]>) -> Vec<&'a [u8]> {
    if sent_changes.is_empty() {
        return candidates;
    }

    let mut index: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
    for (i, change) in sent_changes.iter().enumerate() {
        index.entry(checksum_of(change)).or_default().push(i);
    }

    candidates
        .into_iter()
        .filter(|change| {
            match index.get(&checksum_of(change)) {
                Some(positions) => !positions.iter().any(|&i| sent_changes[i] == *change),
                None => true,
            }
        })
        .collect()
}
