//! `[lint]` section configuration.
//!
//! ```toml
//! [lint]
//! enable = true   # Run advisory lint jobs over scripts
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub enable: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_lint_toggle() {
        assert!(test_parse_config("").lint.enable);
        assert!(!test_parse_config("[lint]\nenable = false").lint.enable);
    }
}
