//! Stylesheet dialect compilers run as external commands.
//!
//! The source is piped to stdin and the compiled CSS read from stdout. The
//! command runs in the source file's directory so relative imports resolve.

use std::path::Path;

use super::{StageContext, Transformer};
use crate::config::EnginesConfig;
use crate::pipeline::StageOptions;
use crate::utils::exec::{Cmd, SILENT_FILTER};

pub struct ExternalCompiler;

impl Transformer for ExternalCompiler {
    fn transform(
        &self,
        source: &[u8],
        options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        let command = options
            .command()
            .ok_or_else(|| format!("{} has no command", options.stage()))?;

        let argv = command_line(command, options, ctx.path);
        let mut cmd = Cmd::from_slice(&argv).stdin(source).filter(&SILENT_FILTER);
        if let Some(dir) = ctx.path.parent() {
            cmd = cmd.cwd(dir);
        }

        // Non-zero exits come back as errors carrying stderr
        let output = cmd.run().map_err(|e| format!("{e:#}"))?;
        Ok(output.stdout)
    }

    fn check(&self, options: &StageOptions) -> Result<(), String> {
        let command = options
            .command()
            .ok_or_else(|| format!("{} has no command", options.stage()))?;
        EnginesConfig::check_command(command)
    }
}

/// Full argument vector for one source file.
///
/// Sass reads stdin as SCSS, so indented-syntax `.sass` files need
/// `--indented`.
fn command_line(command: &[String], options: &StageOptions, path: &Path) -> Vec<String> {
    let mut argv = command.to_vec();
    let indented = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sass"));
    if indented
        && matches!(options, StageOptions::SassCompile { .. })
        && !argv.iter().any(|a| a == "--indented")
    {
        argv.push("--indented".into());
    }
    argv
}
