//! Project directories on disk: `index.html`, `index.css`, `index.js`.

use crate::error::StudioResult;
use std::io::ErrorKind;
use std::path::Path;
use webcrafter_core::{CodeBundle, Language};

/// Reads a project directory. `index.html` is required; missing css/js files are empty.
pub async fn read_project(dir: &Path) -> StudioResult<CodeBundle> {
    let mut bundle = CodeBundle::default();
    for language in Language::ALL {
        let path = dir.join(language.file_name());
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => bundle.set(language, text),
            Err(e) if e.kind() == ErrorKind::NotFound && language != Language::Html => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(bundle)
}

/// Writes the three files into `dir`, creating it if needed.
pub async fn write_project(dir: &Path, bundle: &CodeBundle) -> StudioResult<()> {
    tokio::fs::create_dir_all(dir).await?;
    for language in Language::ALL {
        tokio::fs::write(dir.join(language.file_name()), bundle.get(language)).await?;
    }
    tracing::info!(dir = %dir.display(), "project written");
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = CodeBundle::new("<p>x</p>", "p{}", "go()");
        write_project(&dir.path().join("site"), &bundle).await.unwrap();
        assert_eq!(read_project(&dir.path().join("site")).await.unwrap(), bundle);
    }

    #[tokio::test]
    async fn test_html_is_required() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("index.css"), "p{}").await.unwrap();
        assert!(read_project(dir.path()).await.is_err());

        tokio::fs::write(dir.path().join("index.html"), "<p>x</p>").await.unwrap();
        let bundle = read_project(dir.path()).await.unwrap();
        assert_eq!(bundle, CodeBundle::new("<p>x</p>", "p{}", ""));
    }
}
