//! Extraction configuration.
//!
//! One [`ExtractionConfig`] describes how a provider's report template is
//! read: where the fund's table lives, the column geometry, which currency
//! codes are valid, which rows are noise and how numbers are written.
//! Configurations are plain data and deserialize from JSON; literal anchor
//! strings and coordinates are never hard-coded in the engine.
//!
//! # Example
//!
//! ```
//! use pdfholdings::config::{ColumnRole, ExtractionConfig, TableConfig};
//!
//! let table = TableConfig::new(
//!     vec![300.0, 360.0, 450.0],
//!     vec![
//!         ColumnRole::HoldingName,
//!         ColumnRole::Currency,
//!         ColumnRole::MarketValue,
//!         ColumnRole::NetAssets,
//!     ],
//! );
//! let config = ExtractionConfig::new("example", table);
//! assert!(config.validate().is_ok());
//! ```

mod pattern;
pub mod registry;

pub use pattern::Pattern;
pub use registry::{Provider, ProviderRegistry};

pub use crate::model::{Area, ExtractionMode};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// ISO 4217 codes accepted when a configuration does not list its own.
pub const DEFAULT_CURRENCY_CODES: &[&str] = &[
    "AED", "ARS", "AUD", "BRL", "CAD", "CHF", "CLP", "CNY", "COP", "CZK", "DKK", "EGP", "EUR",
    "GBP", "HKD", "HUF", "IDR", "ILS", "INR", "ISK", "JPY", "KRW", "KWD", "MAD", "MXN", "MYR",
    "NOK", "NZD", "PEN", "PHP", "PLN", "QAR", "RON", "RUB", "SAR", "SEK", "SGD", "THB", "TRY",
    "TWD", "USD", "ZAR",
];

/// Aggregate line labels that carry no currency of their own.
pub const DEFAULT_STRUCTURAL_AGGREGATES: &[&str] = &[
    "Créances",
    "Dettes",
    "Comptes financiers",
    "Avoirs en banque",
    "Liquidités",
    "Liquidités et autres actifs nets",
    "CREANCES ET DETTES DIVERSES",
    "AUTRES",
];

/// Full description of how to read one report template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Template name, used in logs
    pub name: String,
    /// How the fund's pages are found
    #[serde(default)]
    pub locator: LocatorConfig,
    /// Column geometry
    pub table: TableConfig,
    /// Valid currencies and currency recovery
    #[serde(default)]
    pub currencies: CurrencyConfig,
    /// Rows and names to discard
    #[serde(default)]
    pub noise: NoiseConfig,
    /// Number formatting
    #[serde(default)]
    pub numeric_locale: NumericLocale,
    /// A table whose net-assets total falls below this is rejected so the
    /// next template can be tried.
    #[serde(default)]
    pub min_net_assets_total: Option<f64>,
}

impl ExtractionConfig {
    /// Create a configuration with default locator, currency, noise and
    /// locale settings.
    pub fn new(name: impl Into<String>, table: TableConfig) -> Self {
        Self {
            name: name.into(),
            locator: LocatorConfig::default(),
            table,
            currencies: CurrencyConfig::default(),
            noise: NoiseConfig::default(),
            numeric_locale: NumericLocale::default(),
            min_net_assets_total: None,
        }
    }

    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the locator settings.
    pub fn with_locator(mut self, locator: LocatorConfig) -> Self {
        self.locator = locator;
        self
    }

    /// Set the currency settings.
    pub fn with_currencies(mut self, currencies: CurrencyConfig) -> Self {
        self.currencies = currencies;
        self
    }

    /// Set the noise settings.
    pub fn with_noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = noise;
        self
    }

    /// Set the numeric locale.
    pub fn with_numeric_locale(mut self, locale: NumericLocale) -> Self {
        self.numeric_locale = locale;
        self
    }

    /// Set the net-assets sanity threshold.
    pub fn with_min_net_assets_total(mut self, total: f64) -> Self {
        self.min_net_assets_total = Some(total);
        self
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        let table = &self.table;
        let err = |msg: String| Err(Error::Config(format!("{}: {}", self.name, msg)));

        if table.panels == 0 {
            return err("panels must be at least 1".into());
        }
        if table.columns.len() * table.panels != table.column_boundaries.len() + 1 {
            return err(format!(
                "{} columns x {} panels does not match {} boundaries",
                table.columns.len(),
                table.panels,
                table.column_boundaries.len()
            ));
        }
        if table.column_boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return err("column boundaries must be strictly ascending".into());
        }
        for role in [
            ColumnRole::HoldingName,
            ColumnRole::MarketValue,
            ColumnRole::NetAssets,
        ] {
            match table.columns.iter().filter(|c| **c == role).count() {
                1 => {}
                0 => return err(format!("missing {:?} column", role)),
                _ => return err(format!("duplicate {:?} column", role)),
            }
        }
        if table.columns.iter().filter(|c| **c == ColumnRole::Currency).count() > 1 {
            return err("duplicate Currency column".into());
        }
        if let Some(toc) = &self.locator.toc {
            if toc.search_pages == 0 {
                return err("toc.search_pages must be at least 1".into());
            }
        }
        if self.locator.toc.is_none() && self.locator.table_anchor.is_none() {
            return err("locator needs a table of contents or a table anchor".into());
        }
        if self.numeric_locale.thousands_separator == Some(self.numeric_locale.decimal_separator)
        {
            return err("decimal and thousands separators must differ".into());
        }
        Ok(())
    }

    /// Column index of a role within one panel.
    pub fn column_of(&self, role: ColumnRole) -> Option<usize> {
        self.table.columns.iter().position(|c| *c == role)
    }
}

/// Meaning of one column of the table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    HoldingName,
    Currency,
    MarketValue,
    NetAssets,
    /// Present on the page but not part of the output (quantity, price, ...)
    Ignore,
}

/// Column geometry of the holdings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Grid recovery mode
    #[serde(default)]
    pub mode: ExtractionMode,
    /// Column split positions across the whole page (all panels)
    pub column_boundaries: Vec<f32>,
    /// Schema of one panel, left to right
    pub columns: Vec<ColumnRole>,
    /// Side-by-side copies of the schema per page
    #[serde(default = "default_panels")]
    pub panels: usize,
    /// Crop applied to every table page
    #[serde(default)]
    pub area: Option<Area>,
}

fn default_panels() -> usize {
    1
}

impl TableConfig {
    /// Create a single-panel stream-mode geometry.
    pub fn new(column_boundaries: Vec<f32>, columns: Vec<ColumnRole>) -> Self {
        Self {
            mode: ExtractionMode::Stream,
            column_boundaries,
            columns,
            panels: 1,
            area: None,
        }
    }

    /// Set the extraction mode.
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of side-by-side panels.
    pub fn with_panels(mut self, panels: usize) -> Self {
        self.panels = panels;
        self
    }

    /// Restrict extraction to an area.
    pub fn with_area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }
}

/// Text that marks a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Matched case-insensitively with all whitespace removed on both sides
    Literal(String),
    /// Matched against the page text as extracted
    Regex(Pattern),
}

impl Anchor {
    /// Literal anchor.
    pub fn literal(text: impl Into<String>) -> Self {
        Anchor::Literal(text.into())
    }

    /// Regex anchor.
    pub fn regex(source: &str) -> Result<Self> {
        Ok(Anchor::Regex(Pattern::new(source)?))
    }
}

/// How to find the fund's table pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Table-of-contents lookup, tried first when present
    #[serde(default)]
    pub toc: Option<TocConfig>,
    /// Heading that starts a holdings table
    #[serde(default)]
    pub table_anchor: Option<Anchor>,
    /// Page walk used by the anchor scan
    #[serde(default)]
    pub scan: ScanConfig,
    /// Transform applied to fund names before matching
    #[serde(default)]
    pub name_cleaner: NameCleaner,
}

impl LocatorConfig {
    /// Create an empty locator configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table-of-contents lookup.
    pub fn with_toc(mut self, toc: TocConfig) -> Self {
        self.toc = Some(toc);
        self
    }

    /// Set the table anchor.
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.table_anchor = Some(anchor);
        self
    }

    /// Set the scan settings.
    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// Set the name cleaner.
    pub fn with_name_cleaner(mut self, cleaner: NameCleaner) -> Self {
        self.name_cleaner = cleaner;
        self
    }
}

/// Table-of-contents lookup.
///
/// The page range of a fund runs from its entry's page plus
/// `start_offset` to the next entry's page plus `end_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocConfig {
    /// Heading of the table of contents
    pub anchor: Anchor,
    /// How many leading pages may hold the table of contents
    #[serde(default = "default_search_pages")]
    pub search_pages: u32,
    /// Split between the entry text and the page number column
    pub page_column_x: f32,
    /// Crop applied to table-of-contents pages
    #[serde(default)]
    pub area: Option<Area>,
    /// Shift from the printed entry page to the first table page
    #[serde(default)]
    pub start_offset: i32,
    /// Shift from the next entry's page to the last table page
    #[serde(default = "default_end_offset")]
    pub end_offset: i32,
    /// Entries from this one onward are ignored
    #[serde(default)]
    pub stop_entry: Option<String>,
    /// Narrow the range to the contiguous run of table-anchor pages
    #[serde(default)]
    pub refine_with_anchor: bool,
    /// Cap on the range length for the last entry
    #[serde(default)]
    pub max_pages: Option<u32>,
}

fn default_search_pages() -> u32 {
    10
}

fn default_end_offset() -> i32 {
    -1
}

impl TocConfig {
    /// Create a lookup with default offsets.
    pub fn new(anchor: Anchor, page_column_x: f32) -> Self {
        Self {
            anchor,
            search_pages: default_search_pages(),
            page_column_x,
            area: None,
            start_offset: 0,
            end_offset: default_end_offset(),
            stop_entry: None,
            refine_with_anchor: false,
            max_pages: None,
        }
    }

    /// Set the page offsets.
    pub fn with_offsets(mut self, start_offset: i32, end_offset: i32) -> Self {
        self.start_offset = start_offset;
        self.end_offset = end_offset;
        self
    }

    /// Set the entry after which the table of contents is ignored.
    pub fn with_stop_entry(mut self, entry: impl Into<String>) -> Self {
        self.stop_entry = Some(entry.into());
        self
    }

    /// Narrow the located range with the table anchor.
    pub fn refined(mut self) -> Self {
        self.refine_with_anchor = true;
        self
    }

    /// Restrict table-of-contents pages to an area.
    pub fn with_area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }

    /// Set how many leading pages are searched.
    pub fn with_search_pages(mut self, pages: u32) -> Self {
        self.search_pages = pages;
        self
    }
}

/// Direction of the anchor page walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// From the first page toward the last
    #[default]
    Forward,
    /// From the last page toward the first
    Backward,
    /// Forward within an inclusive page window
    Window { start: u32, end: u32 },
}

/// Which pages after the first anchor hit belong to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Only consecutive pages that carry the anchor
    #[default]
    Contiguous,
    /// Every page up to the next anchor page that belongs to another fund
    UntilNextAnchor,
}

/// Anchor scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub direction: ScanDirection,
    #[serde(default)]
    pub run: RunMode,
    /// Longest page run accepted
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// The fund name must also appear on an anchor page
    #[serde(default = "default_true")]
    pub require_name: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            direction: ScanDirection::Forward,
            run: RunMode::Contiguous,
            max_pages: None,
            require_name: true,
        }
    }
}

impl ScanConfig {
    /// Create default scan settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the direction.
    pub fn with_direction(mut self, direction: ScanDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Set the run mode.
    pub fn with_run(mut self, run: RunMode) -> Self {
        self.run = run;
        self
    }

    /// Cap the run length.
    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = Some(pages);
        self
    }

    /// Enable or disable the fund-name requirement.
    pub fn with_require_name(mut self, require: bool) -> Self {
        self.require_name = require;
        self
    }
}

/// Provider-specific cleanup of fund names before matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameCleaner {
    /// Fragments removed from the name (share-class prefixes and the like)
    #[serde(default)]
    pub strip_patterns: Vec<Pattern>,
    /// Separator splitting the name into segments
    #[serde(default)]
    pub split_on: Option<String>,
    /// Segment to keep after splitting; negative counts from the end
    #[serde(default)]
    pub segment: Option<isize>,
}

impl NameCleaner {
    /// Create a cleaner that leaves names unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every match of a pattern.
    pub fn strip(mut self, pattern: Pattern) -> Self {
        self.strip_patterns.push(pattern);
        self
    }

    /// Keep one segment of the name split on a separator.
    pub fn split(mut self, separator: impl Into<String>, segment: isize) -> Self {
        self.split_on = Some(separator.into());
        self.segment = Some(segment);
        self
    }

    /// Apply the cleanup. Falls back to the stripped name when the
    /// requested segment does not exist or is blank.
    pub fn apply(&self, name: &str) -> String {
        let mut cleaned = name.to_string();
        for pattern in &self.strip_patterns {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }

        if let (Some(sep), Some(segment)) = (&self.split_on, self.segment) {
            let parts: Vec<&str> = cleaned.split(sep.as_str()).collect();
            let index = if segment < 0 {
                parts.len() as isize + segment
            } else {
                segment
            };
            if let Some(part) = usize::try_from(index).ok().and_then(|i| parts.get(i)) {
                if !part.trim().is_empty() {
                    cleaned = part.to_string();
                }
            }
        }

        cleaned.trim().to_string()
    }
}

/// Valid currencies and how missing ones are recovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Accepted ISO-like codes
    #[serde(default = "default_codes")]
    pub codes: Vec<String>,
    /// Non-standard labels accepted as they are (e.g. "CNH", "UNITÉ")
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Regex whose first capture group, searched in the first table page's
    /// text, gives the table-wide currency
    #[serde(default)]
    pub hint_pattern: Option<Pattern>,
    /// Table-wide currency when the report states it nowhere
    #[serde(default)]
    pub default: Option<String>,
    /// Move a currency code printed inside the holding name into the
    /// currency field
    #[serde(default)]
    pub extract_embedded: bool,
    /// Remove digits from the currency cell (footnote markers)
    #[serde(default)]
    pub strip_digits: bool,
}

fn default_codes() -> Vec<String> {
    DEFAULT_CURRENCY_CODES.iter().map(|c| c.to_string()).collect()
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            codes: default_codes(),
            aliases: Vec::new(),
            hint_pattern: None,
            default: None,
            extract_embedded: false,
            strip_digits: false,
        }
    }
}

impl CurrencyConfig {
    /// Add accepted aliases.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Set the page-heading hint pattern.
    pub fn with_hint_pattern(mut self, pattern: Pattern) -> Self {
        self.hint_pattern = Some(pattern);
        self
    }

    /// Set the table-wide default currency.
    pub fn with_default(mut self, code: impl Into<String>) -> Self {
        self.default = Some(code.into());
        self
    }

    /// Enable extraction of codes embedded in names.
    pub fn with_embedded_extraction(mut self) -> Self {
        self.extract_embedded = true;
        self
    }

    /// Enable digit stripping.
    pub fn with_digit_stripping(mut self) -> Self {
        self.strip_digits = true;
        self
    }
}

/// Noise rows and names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Aggregate lines kept even without a currency
    #[serde(default = "default_aggregates")]
    pub structural_aggregates: Vec<String>,
    /// Names dropped on exact (normalized) match
    #[serde(default)]
    pub denylist: Vec<String>,
    /// Names dropped when any pattern matches
    #[serde(default)]
    pub deny_patterns: Vec<Pattern>,
    /// Names longer than this (in characters) are corrupted
    #[serde(default)]
    pub max_name_length: Option<usize>,
    /// Characters replaced by a space in holding names
    #[serde(default)]
    pub strip_chars: String,
}

fn default_aggregates() -> Vec<String> {
    DEFAULT_STRUCTURAL_AGGREGATES
        .iter()
        .map(|a| a.to_string())
        .collect()
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            structural_aggregates: default_aggregates(),
            denylist: Vec::new(),
            deny_patterns: Vec::new(),
            max_name_length: None,
            strip_chars: String::new(),
        }
    }
}

impl NoiseConfig {
    /// Add names to the denylist.
    pub fn deny<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add a deny pattern.
    pub fn deny_pattern(mut self, pattern: Pattern) -> Self {
        self.deny_patterns.push(pattern);
        self
    }

    /// Set the maximum name length.
    pub fn with_max_name_length(mut self, len: usize) -> Self {
        self.max_name_length = Some(len);
        self
    }

    /// Set the characters stripped from names.
    pub fn with_strip_chars(mut self, chars: impl Into<String>) -> Self {
        self.strip_chars = chars.into();
        self
    }
}

/// Decimal and grouping separators used by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericLocale {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
}

impl NumericLocale {
    /// `1.234,56`
    pub fn comma_decimal() -> Self {
        Self {
            decimal_separator: ',',
            thousands_separator: Some('.'),
        }
    }

    /// `1,234.56`
    pub fn dot_decimal() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: Some(','),
        }
    }
}

impl Default for NumericLocale {
    fn default() -> Self {
        Self::comma_decimal()
    }
}
