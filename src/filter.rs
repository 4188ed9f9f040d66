//! Noise filtering.
//!
//! Two passes: [`NoiseFilter::screen`] drops banner rows, sub-headers and
//! totals before reassembly so they never get glued onto a holding name;
//! [`NoiseFilter::retain`] cleans names after normalization and drops
//! corrupted ones.

use std::collections::HashSet;

use crate::config::{NoiseConfig, Pattern};
use crate::locate::matching::fold;
use crate::model::{CanonicalRecord, RawRecord, TableStats};

/// Noise filter for one configuration.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    aggregates: HashSet<String>,
    denylist: HashSet<String>,
    deny_patterns: Vec<Pattern>,
    max_name_length: Option<usize>,
    strip_chars: Vec<char>,
}

impl NoiseFilter {
    pub fn new(config: &NoiseConfig) -> Self {
        Self {
            aggregates: config.structural_aggregates.iter().map(|a| fold(a)).collect(),
            denylist: config.denylist.iter().map(|d| fold(d)).collect(),
            deny_patterns: config.deny_patterns.clone(),
            max_name_length: config.max_name_length,
            strip_chars: config.strip_chars.chars().collect(),
        }
    }

    /// Replace configured characters by spaces and collapse whitespace.
    pub fn clean_name(&self, name: &str) -> String {
        name.chars()
            .map(|c| if self.strip_chars.contains(&c) { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if a name is a structural aggregate line.
    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregates.contains(&fold(&self.clean_name(name)))
    }

    /// Check if a name is on the denylist or matches a deny pattern.
    pub fn is_noise(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.denylist.contains(&fold(name)) || self.deny_patterns.iter().any(|p| p.is_match(name))
    }

    /// Check if a cleaned name is unusable.
    pub fn is_corrupted(&self, name: &str) -> bool {
        name.trim().is_empty()
            || name.chars().any(char::is_control)
            || self
                .max_name_length
                .is_some_and(|max| name.chars().count() > max)
    }

    /// Drop noise rows before reassembly.
    pub fn screen(&self, rows: Vec<RawRecord>, stats: &mut TableStats) -> Vec<RawRecord> {
        let before = rows.len();
        let kept: Vec<RawRecord> = rows
            .into_iter()
            .filter(|row| {
                let noise = self.is_noise(&row.holding_name);
                if noise {
                    log::debug!("dropping noise row {:?} on page {}", row.holding_name, row.page);
                }
                !noise
            })
            .collect();
        stats.noise_rows += before - kept.len();
        kept
    }

    /// Clean names and drop corrupted records. Structural aggregates are
    /// always kept.
    pub fn retain(&self, records: Vec<CanonicalRecord>, stats: &mut TableStats) -> Vec<CanonicalRecord> {
        let mut kept = Vec::with_capacity(records.len());
        for mut record in records {
            if self.is_aggregate(&record.holding_name) {
                record.holding_name = self.clean_name(&record.holding_name);
                kept.push(record);
                continue;
            }

            // Control characters are checked before cleaning folds them away
            if self.is_corrupted(&record.holding_name) {
                log::debug!("dropping corrupted name {:?}", record.holding_name);
                stats.corrupted_names += 1;
                continue;
            }
            let cleaned = self.clean_name(&record.holding_name);
            if self.is_corrupted(&cleaned) {
                log::debug!("dropping corrupted name {:?}", record.holding_name);
                stats.corrupted_names += 1;
                continue;
            }
            record.holding_name = cleaned;
            kept.push(record);
        }
        kept
    }
}
