//! Advisory script checks.
//!
//! Findings are reported as warnings and never stop a build.

use std::fmt;
use std::path::{Path, PathBuf};

use super::script;

/// One advisory finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub path: PathBuf,
    /// 1-based.
    pub line: usize,
    pub rule: String,
    pub message: String,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.path.display(),
            self.line,
            self.message,
            self.rule
        )
    }
}

/// Check one script against `rules`.
///
/// Unknown rule names are ignored. A script that does not parse yields an
/// error; the transform stage reports the same problem as fatal.
pub fn lint(path: &Path, source: &[u8], rules: &[String]) -> Result<Vec<LintFinding>, String> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }
    let source = super::as_text(source)?;
    let facts = script::analyze(path, source)?;

    let mut findings = Vec::new();
    if rules.iter().any(|r| r == "no-var") {
        findings.extend(facts.var_lines.iter().map(|&line| LintFinding {
            path: path.to_path_buf(),
            line,
            rule: "no-var".into(),
            message: "unexpected `var`, use `let` or `const` instead".into(),
        }));
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<String> {
        vec!["no-var".into()]
    }

    #[test]
    fn test_reports_var_declarations() {
        let source = b"const a = 1;\nvar b = 2;\nvar c = 3;\n";
        let findings = lint(Path::new("src/main.js"), source, &rules()).unwrap();
        let lines: Vec<_> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert!(findings.iter().all(|f| f.rule == "no-var"));
    }

    #[test]
    fn test_clean_script() {
        let findings = lint(Path::new("a.js"), b"let x = 1;\nexport { x };\n", &rules()).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_no_rules_skips_parsing() {
        // Not valid JavaScript, but nothing is checked
        assert!(lint(Path::new("a.js"), b"var = ;", &[]).unwrap().is_empty());
        assert!(lint(Path::new("a.js"), b"var = ;", &rules()).is_err());
    }

    #[test]
    fn test_display() {
        let finding = LintFinding {
            path: PathBuf::from("src/a.js"),
            line: 4,
            rule: "no-var".into(),
            message: "unexpected `var`".into(),
        };
        assert_eq!(finding.to_string(), "src/a.js:4: unexpected `var` (no-var)");
    }
}
