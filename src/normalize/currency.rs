//! Currency cell recognition.

use std::collections::HashSet;

use crate::config::CurrencyConfig;

/// Recognizes currency codes and aliases for one configuration.
#[derive(Debug, Clone)]
pub struct CurrencyResolver {
    codes: HashSet<String>,
    aliases: HashSet<String>,
    strip_digits: bool,
}

impl CurrencyResolver {
    pub fn new(config: &CurrencyConfig) -> Self {
        Self {
            codes: config.codes.iter().map(|c| c.trim().to_uppercase()).collect(),
            aliases: config.aliases.iter().map(|a| a.trim().to_uppercase()).collect(),
            strip_digits: config.strip_digits,
        }
    }

    /// Trim, uppercase and (when configured) drop footnote digits.
    pub fn clean(&self, raw: &str) -> String {
        let upper = raw.trim().to_uppercase();
        if self.strip_digits {
            upper
                .chars()
                .filter(|c| !c.is_ascii_digit())
                .collect::<String>()
                .trim()
                .to_string()
        } else {
            upper
        }
    }

    /// Check if a cleaned value is an accepted code or alias.
    pub fn is_known(&self, code: &str) -> bool {
        self.codes.contains(code) || self.aliases.contains(code)
    }

    /// Find a standalone ISO code inside a holding name.
    ///
    /// Returns the name without the code and the code. Only the configured
    /// codes are looked for; aliases are too ambiguous inside free text.
    pub fn split_embedded(&self, name: &str) -> Option<(String, String)> {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let position = tokens.iter().rposition(|token| {
            let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
            bare.len() == 3 && bare == bare.to_uppercase() && self.codes.contains(bare)
        })?;

        let code = tokens[position]
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();
        let rest: Vec<&str> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, t)| *t)
            .collect();
        Some((rest.join(" "), code))
    }
}
