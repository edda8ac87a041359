//! Lines up stored landing-page URLs with the rows the search-performance
//! source reports. Runs a direct pass on canonical keys first and only falls
//! back to the variant index when nothing matched directly, which keeps the
//! locale-insertion heuristic from stealing exact matches.

use std::collections::HashMap;
use tracing::debug;

use crate::models::SearchMetricRow;
use crate::urls::{generate_variants, normalize};

/// Map each target URL to the provider row that matched it, or `None`.
///
/// Variant-index collisions between two targets are resolved first-registered
/// wins; which target claims a contested row is therefore order-dependent.
/// Total: malformed URLs on either side degrade to string matching.
pub fn match_external_rows(
    targets: &[String],
    rows: &[SearchMetricRow],
) -> HashMap<String, Option<SearchMetricRow>> {
    let mut matched: HashMap<String, Option<SearchMetricRow>> =
        targets.iter().map(|t| (t.clone(), None)).collect();

    // Canonical key -> target, for the direct pass.
    let mut direct: HashMap<String, &String> = HashMap::new();
    for target in targets {
        direct.entry(normalize(target)).or_insert(target);
    }

    // Normalized variant -> target. First-registered target wins.
    let mut variant_index: HashMap<String, &String> = HashMap::new();
    for target in targets {
        for variant in generate_variants(target) {
            variant_index.entry(normalize(&variant)).or_insert(target);
        }
    }

    for row in rows {
        let key = normalize(&row.page);
        let target = direct
            .get(&key)
            .or_else(|| variant_index.get(&key))
            .copied();

        let Some(target) = target else {
            continue;
        };
        // Index keys always come from the input target list.
        if let Some(slot) = matched.get_mut(target) {
            if slot.is_none() {
                *slot = Some(row.clone());
            } else {
                debug!("{} already matched, dropping row {}", target, row.page);
            }
        }
    }

    matched
}
