//! Completeness-based deduplication.
//!
//! Upstream catalogs record the same object several times with different
//! fields filled in. Rows sharing a key (usually rounded coordinates) are
//! collapsed to the single row with the most non-missing fields.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{Catalog, is_missing};
use crate::error::SchemaError;

/// Which columns form the duplicate key and how they are compared.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    pub keys: Vec<String>,
    /// Round numeric key values to this many decimals before comparing.
    /// `None` compares the trimmed text exactly.
    pub decimals: Option<u32>,
}

impl DedupConfig {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>, decimals: Option<u32>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            decimals,
        }
    }
}

/// Row counts around a deduplication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DedupSummary {
    pub before: usize,
    pub after: usize,
}

impl DedupSummary {
    pub fn dropped(&self) -> usize {
        self.before - self.after
    }
}

fn key_part(field: &str, decimals: Option<u32>) -> String {
    let trimmed = field.trim();
    if is_missing(trimmed) {
        return String::new();
    }
    match (decimals, trimmed.parse::<f64>()) {
        (Some(places), Ok(v)) if v.is_finite() => {
            let s = format!("{:.*}", places as usize, v);
            // "-0.000" and "0.000" are the same key.
            if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') {
                s[1..].to_string()
            } else {
                s
            }
        }
        // "10", "10.0" and "1e1" are the same key.
        (None, Ok(v)) if v.is_finite() => {
            let v = if v == 0.0 { 0.0 } else { v };
            format!("{v:?}")
        }
        _ => trimmed.to_string(),
    }
}

/// Collapse rows sharing a key to the most complete one.
///
/// Numeric key fields compare by value, so `10` and `10.0` are one key. An
/// empty key list leaves the catalog unchanged. Ties on completeness go to
/// the earliest row. Survivors keep their original relative order and the
/// catalog keeps its schema. Running this
/// on its own output changes nothing.
pub fn deduplicate(
    catalog: &Catalog,
    config: &DedupConfig,
) -> Result<(Catalog, DedupSummary), SchemaError> {
    let summary = DedupSummary {
        before: catalog.len(),
        after: catalog.len(),
    };
    if config.keys.is_empty() {
        warn!("no dedup keys given, catalog left unchanged");
        return Ok((catalog.clone(), summary));
    }

    let keys: Vec<&str> = config.keys.iter().map(String::as_str).collect();
    let cols = catalog.require_columns("dedup input", &keys)?;

    // key -> (surviving row, its completeness)
    let mut best: HashMap<Vec<String>, (usize, usize)> = HashMap::new();
    for row in catalog.rows() {
        let key: Vec<String> = cols
            .iter()
            .map(|&c| key_part(&row.fields()[c], config.decimals))
            .collect();
        let score = row.completeness();
        match best.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert((row.index(), score));
            }
            Entry::Occupied(mut slot) => {
                if score > slot.get().1 {
                    slot.insert((row.index(), score));
                }
            }
        }
    }

    let mut survivors: Vec<usize> = best.into_values().map(|(row, _)| row).collect();
    survivors.sort_unstable();

    let deduped = catalog.select(&survivors);
    let summary = DedupSummary {
        after: deduped.len(),
        ..summary
    };
    info!(
        before = summary.before,
        after = summary.after,
        dropped = summary.dropped(),
        keys = ?config.keys,
        "deduplicated by completeness"
    );
    Ok((deduped, summary))
}
