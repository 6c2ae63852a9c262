//! dev-server: serve the source tree with live reload.

use super::TaskError;
use crate::build::progress::ProgressEvent;
use crate::build::{BuildContext, TaskReport};

/// Start the dev server. The server keeps running after the task finishes;
/// the runner waits on it at the end of the run.
pub fn start_dev_server(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let addr = ctx.start_server()?;
    let base = ctx.resolve_path(&ctx.config().server.base_dir);
    ctx.reporter().report(ProgressEvent::Notice {
        message: format!("Serving {} at http://{}", base.display(), addr),
    });
    Ok(TaskReport::new("dev-server"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use tempfile::TempDir;

    #[test]
    fn test_starts_server_once() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        std::fs::write(temp.path().join("app/index.html"), "<p>hi</p>").unwrap();
        let mut config = default_config();
        config.server.port = 0;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());

        start_dev_server(&ctx).unwrap();
        let addr = ctx.server_addr().unwrap();
        start_dev_server(&ctx).unwrap();
        assert_eq!(ctx.server_addr(), Some(addr));

        let body = ureq::get(&format!("http://{}/", addr)).call().unwrap().into_string().unwrap();
        assert!(body.starts_with("<p>hi</p><script>"));
    }

    #[test]
    fn test_missing_base_dir_fails() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        assert!(matches!(start_dev_server(&ctx), Err(TaskError::Server(_))));
    }
}
