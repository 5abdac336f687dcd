use crate::core::engine::GlobalEnginePaths;
use crate::Result;
use eyre::WrapErr;

pub mod highlight;
pub mod markup;
pub mod template;

#[derive(Debug)]
pub struct Renderers {
    tera: template::TeraRenderer,
    markdown: markup::MarkdownRenderer,
    highlight: highlight::SyntectHighlighter,
}

impl Renderers {
    pub fn new(engine_paths: GlobalEnginePaths) -> Result<Self> {
        let tera = template::TeraRenderer::new(engine_paths.clone()).wrap_err_with(|| {
            format!(
                "Failed to initialize Tera with template root of '{}'",
                engine_paths.abs_template_dir().display()
            )
        })?;
        let markdown = markup::MarkdownRenderer::new();
        let highlight =
            highlight::SyntectHighlighter::new().wrap_err("Failed to initialize Syntect")?;
        Ok(Self {
            tera,
            markdown,
            highlight,
        })
    }

    pub fn markdown(&self) -> &markup::MarkdownRenderer {
        &self.markdown
    }

    pub fn highlight(&self) -> &highlight::SyntectHighlighter {
        &self.highlight
    }

    pub fn tera(&self) -> &template::TeraRenderer {
        &self.tera
    }
}
