//! Manual alias overrides
//!
//! A small curated table mapping troublesome playlist rows to their
//! authoritative EPG ids. Overrides always win during resolution, with
//! confidence 1.0. The table is maintained by hand from the unmatched
//! report, so a missing file is simply an empty table.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::errors::AppResult;
use crate::models::AliasOverride;

/// Lookup key: (lowercased display name, lowercased declared id)
type AliasKey = (String, String);

/// Alias override table keyed by playlist row identity
#[derive(Debug, Default)]
pub struct AliasTable {
    overrides: HashMap<AliasKey, AliasOverride>,
}

impl AliasTable {
    /// Load overrides from a CSV file with columns `m3u_name`,
    /// `tvg_id_current`, `tvg_id_target` and optional `suffix`.
    ///
    /// A missing file yields an empty table.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("No alias file at {}; using empty table", path.display());
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let col = |names: &[&str]| -> Option<usize> {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                names.iter().any(|n| h == *n)
            })
        };

        let name_col = col(&["m3u_name", "name"]);
        let current_col = col(&["tvg_id_current", "tvg_id"]);
        let target_col = col(&["tvg_id_target", "target"]);
        let suffix_col = col(&["suffix", "_suffix"]);

        let mut overrides = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: Option<usize>| -> String {
                idx.and_then(|i| record.get(i))
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default()
            };

            let target = field(target_col);
            let suffix = field(suffix_col).to_lowercase();
            // a row may force only a country hint; fully empty rows are noise
            if target.is_empty() && suffix.is_empty() {
                continue;
            }
            let key = (
                field(name_col).to_lowercase(),
                field(current_col).to_lowercase(),
            );
            overrides.insert(
                key,
                AliasOverride {
                    target,
                    suffix: if suffix.is_empty() { None } else { Some(suffix) },
                },
            );
        }

        info!("Loaded {} alias overrides from {}", overrides.len(), path.display());
        Ok(Self { overrides })
    }

    /// Look up an override for a playlist row.
    pub fn get(&self, name: &str, tvg_id: &str) -> Option<&AliasOverride> {
        let key = (
            name.trim().to_lowercase(),
            tvg_id.trim().to_lowercase(),
        );
        self.overrides.get(&key)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
