//! HTML template injection.
//!
//! Adds stylesheet links, deferred scripts and (in production) script
//! preload hints right before `</head>`.

use std::sync::LazyLock;

use regex::Regex;

static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head[ \t\r\n]*>").expect("valid regex"));
static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body[ \t\r\n>]").expect("valid regex"));

/// Page used when the configured template does not exist.
pub const DEFAULT_TEMPLATE: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>App</title>
</head>
<body>
<div id=\"app\"></div>
</body>
</html>
";

/// Public URLs to reference from the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Injection {
    pub preloads: Vec<String>,
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
}

impl Injection {
    fn tags(&self) -> String {
        let mut tags = String::new();
        for url in &self.preloads {
            tags.push_str(&format!("<link rel=\"preload\" as=\"script\" href=\"{}\">", escape_attr(url)));
        }
        for url in &self.styles {
            tags.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">", escape_attr(url)));
        }
        for url in &self.scripts {
            tags.push_str(&format!("<script defer src=\"{}\"></script>", escape_attr(url)));
        }
        tags
    }
}

/// Insert the tags before `</head>`, or before `<body>` when the template
/// has no head, or at the very start.
pub fn inject(html: &str, injection: &Injection) -> String {
    let tags = injection.tags();
    if tags.is_empty() {
        return html.to_string();
    }
    let at = HEAD_CLOSE
        .find(html)
        .or_else(|| BODY_OPEN.find(html))
        .map_or(0, |m| m.start());

    let mut out = String::with_capacity(html.len() + tags.len());
    out.push_str(&html[..at]);
    out.push_str(&tags);
    out.push_str(&html[at..]);
    out
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
