//! image-optimize: recompress images through the transformation cache.

use super::{read, write, TaskError};
use crate::build::discovery::discover;
use crate::build::{BuildContext, TaskReport};
use crate::cache::CacheStatus;
use crate::transform::{ImageOptimizer, Transform};
use rayon::prelude::*;

pub fn optimize_images(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let config = &ctx.config().images;
    let out_dir = ctx.resolve_path(&config.out);
    let optimizer = ImageOptimizer::new(config.jpeg_quality);
    let cache = config.cache.then(|| ctx.cache());

    let sources = discover(ctx.project_root(), &config.src)?;
    let results = sources
        .par_iter()
        .map(|source| {
            let input = read(&source.path)?;
            let (bytes, status) = match &cache {
                Some(cache) => cache.get_or_apply(&optimizer, &source.path, &input)?,
                None => (optimizer.apply(&source.path, &input)?, CacheStatus::Miss),
            };

            let target = out_dir.join(&source.relative);
            write(&target, &bytes)?;
            Ok((target, status))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;

    let mut report = TaskReport::new("image-optimize");
    for (target, status) in results {
        match status {
            CacheStatus::Hit => report.cache_hits += 1,
            CacheStatus::Miss => report.cache_misses += 1,
        }
        report.outputs.push(target);
    }
    Ok(report)
}
