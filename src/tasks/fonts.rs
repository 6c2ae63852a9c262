//! copy-fonts: copy font files unchanged.

use super::{read, write, TaskError};
use crate::build::discovery::discover;
use crate::build::{BuildContext, TaskReport};
use crate::transform::{Passthrough, Transform};

pub fn copy_fonts(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let config = &ctx.config().fonts;
    let out_dir = ctx.resolve_path(&config.out);

    let mut outputs = Vec::new();
    for source in discover(ctx.project_root(), &config.src)? {
        let bytes = Passthrough.apply(&source.path, &read(&source.path)?)?;
        let target = out_dir.join(&source.relative);
        write(&target, &bytes)?;
        outputs.push(target);
    }

    Ok(TaskReport::new("copy-fonts").with_outputs(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_copies_tree_byte_for_byte() {
        let temp = TempDir::new().unwrap();
        let fonts = temp.path().join("app/fonts");
        fs::create_dir_all(fonts.join("inter")).unwrap();
        let binary: Vec<u8> = (0..=255).collect();
        fs::write(fonts.join("inter/inter.woff2"), &binary).unwrap();
        fs::write(fonts.join("icons.ttf"), b"\x00\x01\x00\x00").unwrap();

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let report = copy_fonts(&ctx).unwrap();

        assert_eq!(report.outputs.len(), 2);
        let dist = temp.path().join("dist/fonts");
        assert_eq!(fs::read(dist.join("inter/inter.woff2")).unwrap(), binary);
        assert_eq!(fs::read(dist.join("icons.ttf")).unwrap(), b"\x00\x01\x00\x00");
    }
}
