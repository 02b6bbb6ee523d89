//! Role stack templates on disk
//!
//! Role stacks deploy from rendered template files in the configured
//! template directory. Bootstrap writes any that are missing before the first
//! engine call; existing files are left alone so hand-edited templates win.

use conveyor_core::role::RoleKind;
use conveyor_core::template::{role_stack_template, template_file_name};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{BootstrapError, Result};

/// Writes the template for every role kind into `dir`
///
/// With `overwrite` unset, files that already exist are kept. Returns the
/// paths written.
pub async fn write_role_templates(dir: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| template_error(dir, source))?;

    let mut written = Vec::new();
    for kind in RoleKind::ALL {
        let path = dir.join(template_file_name(kind));

        if !overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Keeping existing template {}", path.display());
            continue;
        }

        let body = serde_json::to_string_pretty(&role_stack_template(kind))
            .map_err(|e| template_error(&path, io::Error::from(e)))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| template_error(&path, source))?;

        info!("Rendered {} template to {}", kind, path.display());
        written.push(path);
    }

    Ok(written)
}

fn template_error(path: &Path, source: io::Error) -> BootstrapError {
    BootstrapError::Template {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_missing_templates() {
        let dir = tempfile::tempdir().unwrap();
        let stacks = dir.path().join("stacks");

        let written = write_role_templates(&stacks, false).await.unwrap();
        assert_eq!(written.len(), 2);

        let body = std::fs::read_to_string(stacks.join("deployment-role.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(value["Conditions"]["HasKeyArn"].is_object());
    }

    #[tokio::test]
    async fn test_existing_template_kept_unless_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("cross-account-role.json");
        std::fs::write(&custom, "{}").unwrap();

        let written = write_role_templates(dir.path(), false).await.unwrap();
        assert_eq!(written, vec![dir.path().join("deployment-role.json")]);
        assert_eq!(std::fs::read_to_string(&custom).unwrap(), "{}");

        let written = write_role_templates(dir.path(), true).await.unwrap();
        assert_eq!(written.len(), 2);
        assert_ne!(std::fs::read_to_string(&custom).unwrap(), "{}");
    }
}
