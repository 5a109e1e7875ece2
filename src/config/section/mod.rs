//! Configuration section definitions.
//!
//! Each module corresponds to a section in `routepack.toml`:
//!
//! | Module     | TOML Section   | Purpose                                 |
//! |------------|----------------|-----------------------------------------|
//! | `build`    | `[build]`      | Source/output paths, entries, template  |
//! | `resolve`  | `[resolve]`    | Import extensions and aliases           |
//! | `output`   | `[output]`     | Inline threshold, fingerprint lengths   |
//! | `split`    | `[split]`      | Chunk splitting policy                  |
//! | `engines`  | `[engines]`    | Engine commands and browser targets     |
//! | `rules`    | `[rules]`      | Composition table overrides             |
//! | `lint`     | `[lint]`       | Advisory lint jobs                      |

mod build;
mod engines;
mod lint;
mod output;
mod resolve;
mod rules;
mod split;

pub use build::BuildConfig;
pub use engines::{EnginesConfig, TargetsConfig};
pub use lint::LintConfig;
pub use output::OutputConfig;
pub use resolve::ResolveConfig;
pub use rules::RulesConfig;
pub use split::{SplitChunks, SplitConfig};
