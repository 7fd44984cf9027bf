//! One-shot rendering of a markdown file

use anyhow::{bail, Context};
use board_dom::Element;
use board_render::{HandleStatus, MarkdownService, MountRequest, PreviewController, PreviewSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to render and how
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Markdown file to render
    pub path: PathBuf,
    /// Query to highlight in the output
    pub search: Option<String>,
    /// TOML preview configuration
    pub config: Option<PathBuf>,
}

/// Render the file as a single card and return the container outline
///
/// With a search query the outline is followed by the match count.
///
/// # Errors
/// Fails if the file or config cannot be read, or the render does not finish.
pub async fn render_file(options: &RenderOptions) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(&options.path)
        .with_context(|| format!("reading {}", options.path.display()))?;

    let service = Arc::new(MarkdownService::new());
    let session = match options.config.as_deref() {
        Some(config) => PreviewSession::from_config_file(config, service)
            .with_context(|| format!("loading config {}", config.display()))?,
        None => PreviewSession::with_defaults(service),
    };
    let ctx = session.open_view(&options.path);

    let container = Element::new("div");
    container.set_attr("class", "kanban-card");
    let request = MountRequest::new(entity_for(&options.path), content)
        .with_search_query(options.search.clone().unwrap_or_default());
    let card = PreviewController::mount(&ctx, &container, request).await?;
    card.settled().await;

    if card.handle().status() != HandleStatus::Ready {
        bail!("rendering {} failed", options.path.display());
    }

    let mut out = container.outline();
    if let Some(query) = options.search.as_deref() {
        out.push_str(&format!("{} match(es) for {query:?}\n", container.mark_count()));
    }
    session.shutdown();
    Ok(out)
}

fn entity_for(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn renders_file_with_highlights() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# Sprint\n\n- [ ] ship the *preview* cache").unwrap();

        let options = RenderOptions {
            path: file.path().to_path_buf(),
            search: Some("preview".into()),
            config: None,
        };
        let out = render_file(&options).await.unwrap();
        assert!(out.starts_with("<div class=\"kanban-card\">"));
        assert!(out.contains("<h1>"));
        assert!(out.contains("data-checkbox-index=\"0\""));
        assert!(out.ends_with("1 match(es) for \"preview\"\n"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let options = RenderOptions {
            path: PathBuf::from("/definitely/not/here.md"),
            ..RenderOptions::default()
        };
        let err = render_file(&options).await.unwrap_err();
        assert!(err.to_string().starts_with("reading /definitely/not/here.md"));
    }
}
