//! MIME type detection for inlined assets.

/// MIME type constants for the asset kinds the build can inline or emit.
pub mod types {
    pub const HTML: &str = "text/html";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "text/javascript";
    pub const JSON: &str = "application/json";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";

    // Fonts
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";

    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Guess MIME type from a file extension string (with or without the dot).
pub fn from_extension(ext: Option<&str>) -> &'static str {
    let Some(ext) = ext else {
        return types::OCTET_STREAM;
    };
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "html" | "htm" => types::HTML,
        "css" => types::CSS,
        "js" | "mjs" | "cjs" => types::JAVASCRIPT,
        "json" => types::JSON,
        "png" => types::PNG,
        "jpg" | "jpeg" => types::JPEG,
        "gif" => types::GIF,
        "webp" => types::WEBP,
        "svg" => types::SVG,
        "woff" => types::WOFF,
        "woff2" => types::WOFF2,
        "ttf" => types::TTF,
        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(from_extension(Some("png")), types::PNG);
        assert_eq!(from_extension(Some("JPEG")), types::JPEG);
        assert_eq!(from_extension(Some("woff2")), types::WOFF2);
        assert_eq!(from_extension(Some("js")), types::JAVASCRIPT);
        assert_eq!(from_extension(Some("xyz")), types::OCTET_STREAM);
    }

    #[test]
    fn test_from_extension_with_dot() {
        assert_eq!(from_extension(Some(".gif")), types::GIF);
        assert_eq!(from_extension(Some("webp")), types::WEBP);
        assert_eq!(from_extension(None), types::OCTET_STREAM);
    }
}
