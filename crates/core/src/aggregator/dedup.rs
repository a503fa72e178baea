//! Deduplication and ranking of merged crawler output.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::content::{normalize_title, ContentItem};

/// Merge items that share `(normalized title, year)`.
///
/// The first occurrence wins and keeps its position; torrent refs from later
/// duplicates are appended to it unless they point at a swarm it already has.
pub fn deduplicate(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut index: HashMap<(String, u16), usize> = HashMap::new();
    let mut merged: Vec<ContentItem> = Vec::with_capacity(items.len());

    for item in items {
        let key = (normalize_title(&item.title), item.year);
        match index.get(&key) {
            Some(&position) => {
                let existing = &mut merged[position];
                for torrent in item.source_refs {
                    if !existing.source_refs.iter().any(|r| r.same_swarm(&torrent)) {
                        existing.source_refs.push(torrent);
                    }
                }
                if existing.rating_score.is_none() {
                    existing.rating_score = item.rating_score;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }

    merged
}

/// Stable sort: seeders descending, then rating descending.
///
/// Rating only breaks seeder ties so a better-seeded item never ranks below a
/// worse-seeded one. Equal keys keep their input order.
pub fn rank(items: &mut [ContentItem]) {
    items.sort_by(|a, b| {
        b.seeder_count()
            .cmp(&a.seeder_count())
            .then_with(|| compare_rating(b.rating_score, a.rating_score))
    });
}

fn compare_rating(a: Option<f32>, b: Option<f32>) -> Ordering {
    a.unwrap_or(0.0)
        .partial_cmp(&b.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}
