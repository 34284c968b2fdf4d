//! Query evaluation against the core indexer.
//!
//! Each leaf delegates to the indexer's word/property/number term search.
//! AND nodes thread their accumulated result into the right-hand side as a
//! candidate subset; OR unions keeping the best score; NOT complements
//! against all documents.

use crate::index::entry::DocSlot;
use crate::index::indexer::{SearchIndexer, merge_hit};
use crate::query::parser::{CompareOp, QueryNode};
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;

/// Scored candidate set: document slot to best (lowest) score.
pub type HitMap = FxHashMap<DocSlot, i32>;

/// Evaluate a parsed query node. `subset`, when present, restricts candidate
/// documents (AND context).
pub fn evaluate(
    indexer: &SearchIndexer,
    node: &QueryNode,
    subset: Option<&RoaringBitmap>,
) -> HitMap {
    match node {
        QueryNode::Empty => HitMap::default(),

        QueryNode::Word { text, exact } => {
            let op = if *exact {
                CompareOp::Equal
            } else {
                CompareOp::Contains
            };
            let mut hits = indexer.search_word(text, op, subset);
            if *exact {
                // Quoted terms also match against resolved document content,
                // covering substrings that were never tokenized.
                indexer.resolve_content_hits(text, 0, subset, &mut hits);
            }
            hits
        }

        QueryNode::Filter { name, op, value } => match value.parse::<f64>() {
            Ok(number) => indexer.search_number(name, number, *op, subset),
            Err(_) => indexer.search_property(name, value, *op, subset),
        },

        QueryNode::And(children) => {
            let mut current: Option<HitMap> = None;
            for child in children {
                let narrowed: Option<RoaringBitmap> =
                    current.as_ref().map(|hits| hits.keys().copied().collect());
                let child_hits = evaluate(indexer, child, narrowed.as_ref().or(subset));
                current = Some(match current {
                    None => child_hits,
                    Some(previous) => intersect_scores(previous, child_hits),
                });
                if current.as_ref().is_some_and(HitMap::is_empty) {
                    break;
                }
            }
            current.unwrap_or_default()
        }

        QueryNode::Or(children) => {
            let mut union = HitMap::default();
            for child in children {
                for (slot, score) in evaluate(indexer, child, subset) {
                    merge_hit(&mut union, slot, score);
                }
            }
            union
        }

        QueryNode::Not(inner) => {
            let excluded = evaluate(indexer, inner, None);
            let candidates = match subset {
                Some(subset) => subset.clone(),
                None => indexer.all_documents(),
            };
            let mut hits = HitMap::default();
            for slot in candidates {
                if !excluded.contains_key(&slot) {
                    merge_hit(&mut hits, slot, 0);
                }
            }
            hits
        }
    }
}

/// Keep only documents present in both sides, summing scores so every
/// satisfied term contributes to the final relevance.
fn intersect_scores(left: HitMap, right: HitMap) -> HitMap {
    let mut out = HitMap::default();
    for (slot, right_score) in right {
        if let Some(left_score) = left.get(&slot) {
            out.insert(slot, left_score.saturating_add(right_score));
        }
    }
    out
}
