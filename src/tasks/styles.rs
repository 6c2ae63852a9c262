//! style-compile: Sass sources to CSS.

use super::{read, url_path, write, TaskError};
use crate::build::discovery::{discover, glob_base};
use crate::build::{BuildContext, TaskReport};
use crate::livereload::ReloadEvent;
use crate::transform::{ScssCompiler, Transform};
use rayon::prelude::*;
use std::path::PathBuf;

/// Compile every non-partial stylesheet, mirroring the source tree under the
/// output directory, then tell connected browsers to refresh their CSS.
pub fn compile_styles(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let config = &ctx.config().styles;
    let base = ctx.resolve_path(&glob_base(&config.src));
    let out_dir = ctx.resolve_path(&config.out);

    // Partials are only compiled through the files that import them
    let sources: Vec<_> = discover(ctx.project_root(), &config.src)?
        .into_iter()
        .filter(|s| !s.path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('_')))
        .collect();

    let compiler = ScssCompiler::new(config.output_style).with_load_path(base);
    let outputs = sources
        .par_iter()
        .map(|source| {
            let css = compiler.apply(&source.path, &read(&source.path)?)?;
            let target = out_dir.join(&source.relative).with_extension("css");
            write(&target, &css)?;
            Ok(target)
        })
        .collect::<Result<Vec<PathBuf>, TaskError>>()?;

    if !outputs.is_empty() {
        let served_root = ctx.resolve_path(&ctx.config().server.base_dir);
        let hrefs = outputs
            .iter()
            .filter_map(|p| p.strip_prefix(&served_root).ok())
            .map(url_path)
            .collect();
        ctx.reload().notify(ReloadEvent::Css(hrefs));
    }

    Ok(TaskReport::new("style-compile").with_outputs(outputs))
}
