//! Utility modules shared by the pipeline and the build driver.

pub mod exec;
pub mod hash;
pub mod mime;
pub mod path;

/// Format count with noun, handling pluralization.
///
/// `plural_count(1, "asset")` -> `"1 asset"`, `plural_count(3, "chunk")` -> `"3 chunks"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}
