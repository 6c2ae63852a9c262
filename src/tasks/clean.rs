//! clean-output and clear-cache.

use super::TaskError;
use crate::build::{BuildContext, TaskReport};
use std::fs;
use std::path::{Path, PathBuf};

/// Delete the production directory. A missing directory is already clean.
pub fn clean_output(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let target = ctx.resolve_path(&ctx.config().clean.target);
    let report = TaskReport::new("clean-output");

    let metadata = match fs::symlink_metadata(&target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(source) => return Err(TaskError::Io { path: target, source }),
    };

    if !ctx.config().clean.force {
        check_deletable(ctx.project_root(), &target)?;
    }

    if metadata.is_dir() {
        fs::remove_dir_all(&target).map_err(TaskError::io(&target))?;
    } else {
        fs::remove_file(&target).map_err(TaskError::io(&target))?;
    }
    tracing::debug!(path = %target.display(), "removed");

    Ok(report.with_outputs(vec![target]))
}

/// Only directories strictly inside the project may be deleted.
fn check_deletable(project_root: &Path, target: &Path) -> Result<(), TaskError> {
    let refuse = |reason: &str| TaskError::CleanRefused {
        path: target.to_path_buf(),
        reason: reason.to_string(),
    };
    let root = project_root.canonicalize().map_err(TaskError::io(project_root))?;
    let resolved = target.canonicalize().map_err(TaskError::io(target))?;

    if resolved == root {
        Err(refuse("it is the project root"))
    } else if root.starts_with(&resolved) {
        Err(refuse("it contains the project root"))
    } else if !resolved.starts_with(&root) {
        Err(refuse("it is outside the project"))
    } else {
        Ok(())
    }
}

/// Remove every transformation cache entry.
pub fn clear_cache(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let cache = ctx.cache();
    let stats = cache.clear_all()?;
    tracing::info!(entries = stats.entries, bytes = stats.bytes, "cache cleared");

    let outputs: Vec<PathBuf> =
        if stats.entries > 0 { vec![cache.dir().to_path_buf()] } else { Vec::new() };
    Ok(TaskReport::new("clear-cache").with_outputs(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("dist/css")).unwrap();
        fs::write(temp.path().join("dist/css/a.css"), "a{}").unwrap();
        fs::create_dir_all(temp.path().join("app")).unwrap();
        fs::write(temp.path().join("app/index.html"), "<html></html>").unwrap();
        fs::write(temp.path().join("dist-notes.txt"), "keep").unwrap();
        temp
    }

    #[test]
    fn test_removes_only_production_tree() {
        let temp = project();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let report = clean_output(&ctx).unwrap();

        assert_eq!(report.outputs, vec![temp.path().join("dist")]);
        assert!(!temp.path().join("dist").exists());
        assert!(temp.path().join("app/index.html").exists());
        assert!(temp.path().join("dist-notes.txt").exists());
    }

    #[test]
    fn test_missing_directory_succeeds() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let report = clean_output(&ctx).unwrap();
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn test_refuses_project_root_and_outside() {
        let temp = project();

        let mut config = default_config();
        config.clean.target = PathBuf::from(".");
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        assert!(matches!(clean_output(&ctx), Err(TaskError::CleanRefused { .. })));

        let outside = TempDir::new().unwrap();
        let mut config = default_config();
        config.clean.target = outside.path().to_path_buf();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let err = clean_output(&ctx).unwrap_err();
        assert!(err.to_string().contains("outside the project"));
        assert!(outside.path().exists());

        let mut config = default_config();
        config.clean.target = PathBuf::from("..");
        let ctx = BuildContext::new(config, temp.path().join("app"));
        assert!(matches!(clean_output(&ctx), Err(TaskError::CleanRefused { .. })));
        assert!(temp.path().join("app/index.html").exists());
    }

    #[test]
    fn test_force_allows_outside() {
        let temp = project();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("x"), "x").unwrap();

        let mut config = default_config();
        config.clean.target = outside.path().join("x");
        config.clean.force = true;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        clean_output(&ctx).unwrap();
        assert!(!outside.path().join("x").exists());
    }

    #[test]
    fn test_clear_cache() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        fs::create_dir_all(ctx.cache().dir().join("imagemin/ab")).unwrap();
        fs::write(ctx.cache().dir().join("imagemin/ab/abcd"), "x").unwrap();

        let report = clear_cache(&ctx).unwrap();
        assert_eq!(report.outputs.len(), 1);
        assert!(!ctx.cache().dir().exists());
        assert!(clear_cache(&ctx).unwrap().outputs.is_empty());
    }
}
