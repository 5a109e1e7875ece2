//! `[rules]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [rules]
//! skip = ["stylus"]   # Remove these kinds from the composition table
//! ```
//!
//! Any discovered asset of a skipped kind fails the build before work starts.

use crate::core::AssetKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub skip: Vec<AssetKind>,
}

impl RulesConfig {
    #[inline]
    pub fn is_skipped(&self, kind: AssetKind) -> bool {
        self.skip.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PackConfig, test_parse_config};

    #[test]
    fn test_skip_kinds() {
        let config = test_parse_config("[rules]\nskip = [\"stylus\", \"less\"]");
        assert!(config.rules.is_skipped(AssetKind::StylesheetStylus));
        assert!(config.rules.is_skipped(AssetKind::StylesheetLess));
        assert!(!config.rules.is_skipped(AssetKind::Script));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = PackConfig::parse_with_ignored("[rules]\nskip = [\"coffee\"]");
        assert!(result.is_err());
    }
}
