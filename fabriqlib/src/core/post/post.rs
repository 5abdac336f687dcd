use crate::core::config::ParserConfig;
use crate::core::engine::GlobalEnginePaths;
use crate::core::library::SearchKey;
use crate::render::markup::{PostStats, Toc};
use crate::render::template::TemplateName;
use crate::util::slugify;
use crate::Renderers;
use crate::Result;

use eyre::{eyre, WrapErr};
use serde::Serialize;

use std::path::{Path, PathBuf};
use tracing::instrument;

use super::FrontMatter;
use super::{PostKey, RawMarkdown};

#[derive(Clone, Debug, Serialize)]
pub struct Post {
    #[serde(skip)]
    pub engine_paths: GlobalEnginePaths,

    /// Source path relative to the content directory.
    pub rel_path: PathBuf,

    pub raw_doc: String,
    pub post_key: PostKey,

    pub frontmatter: FrontMatter,
    pub raw_markdown: RawMarkdown,

    pub html: String,
    pub toc: Toc,
    pub stats: PostStats,
}

impl Post {
    #[instrument(skip(renderers, parser_config))]
    pub fn from_file(
        engine_paths: GlobalEnginePaths,
        rel_path: &Path,
        renderers: &Renderers,
        parser_config: &ParserConfig,
    ) -> Result<Self> {
        let abs_path = engine_paths.abs_content_dir().join(rel_path);
        let mut file = std::fs::File::open(&abs_path)
            .wrap_err_with(|| format!("failed opening source file {}", abs_path.display()))?;

        Self::from_reader(engine_paths, rel_path, &mut file, renderers, parser_config)
    }

    #[instrument(skip(reader, renderers, parser_config))]
    pub fn from_reader<R>(
        engine_paths: GlobalEnginePaths,
        rel_path: &Path,
        reader: &mut R,
        renderers: &Renderers,
        parser_config: &ParserConfig,
    ) -> Result<Self>
    where
        R: std::io::Read,
    {
        let mut raw_doc = String::new();

        reader.read_to_string(&mut raw_doc).wrap_err_with(|| {
            format!(
                "error reading document into string for path {}",
                rel_path.display()
            )
        })?;

        let (frontmatter, raw_markdown) = split_raw_doc(&raw_doc)
            .wrap_err_with(|| format!("failed parsing raw document for {}", rel_path.display()))?;

        let rendered = renderers
            .markdown()
            .render(&raw_markdown, renderers.highlight(), parser_config)
            .wrap_err_with(|| format!("failed rendering markdown for {}", rel_path.display()))?;

        Ok(Self {
            engine_paths,
            rel_path: rel_path.to_path_buf(),

            raw_doc,
            post_key: PostKey::default(),

            frontmatter,
            raw_markdown,

            html: rendered.html,
            toc: rendered.toc,
            stats: rendered.stats,
        })
    }

    pub fn set_post_key(&mut self, key: PostKey) {
        self.post_key = key;
    }

    pub fn engine_paths(&self) -> GlobalEnginePaths {
        self.engine_paths.clone()
    }

    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    /// Site-relative URL for the post. Always starts and ends with a slash.
    ///
    /// Derived from the source path with each component slugified, unless
    /// the frontmatter pins a `permanent_url`. An `index.md` maps onto its
    /// parent directory.
    pub fn permalink(&self) -> String {
        if let Some(url) = &self.frontmatter.permanent_url {
            return normalize_url(url);
        }

        let mut segments = vec![];
        if let Some(parent) = self.rel_path.parent() {
            for part in parent.components() {
                segments.push(slugify(&part.as_os_str().to_string_lossy()));
            }
        }
        match self.rel_path.file_stem() {
            Some(stem) if stem != "index" => {
                segments.push(slugify(&stem.to_string_lossy()));
            }
            _ => (),
        }

        if segments.is_empty() {
            String::from("/")
        } else {
            format!("/{}/", segments.join("/"))
        }
    }

    /// Absolute path of the rendered output file (`<permalink>/index.html`
    /// under the output directory).
    pub fn target(&self) -> PathBuf {
        let mut target = self.engine_paths.abs_output_dir().to_path_buf();
        for segment in self.permalink().split('/').filter(|s| !s.is_empty()) {
            target.push(segment);
        }
        target.push("index.html");
        target
    }

    pub fn search_key(&self) -> SearchKey {
        SearchKey::new(self.permalink())
    }

    pub fn template_name(&self) -> TemplateName {
        TemplateName::new(format!("{}.html", self.frontmatter.template))
    }

    /// A post is published when it isn't hidden and isn't dated in the future.
    pub fn is_published(&self, now_ts: i64) -> bool {
        if self.frontmatter.hidden {
            return false;
        }
        match self.frontmatter.creation_ts() {
            Some(ts) => ts <= now_ts,
            None => true,
        }
    }
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::from("/")
    } else {
        format!("/{}/", trimmed)
    }
}

fn split_raw_doc<S: AsRef<str>>(raw: S) -> Result<(FrontMatter, RawMarkdown)> {
    let raw = raw.as_ref();

    let (raw_frontmatter, raw_markdown) = split_document(raw)
        .wrap_err_with(|| String::from("failed to split raw document into component parts"))?;

    let frontmatter = if raw_frontmatter.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(raw_frontmatter)
            .wrap_err_with(|| String::from("failed parsing frontmatter into YAML"))?
    };
    let raw_markdown = RawMarkdown::from_raw(raw_markdown);
    Ok((frontmatter, raw_markdown))
}

fn split_document(raw: &str) -> Result<(&str, &str)> {
    let opening = crate::util::static_regex!(r#"^[[:space:]]*---[[:space:]]*\n"#);
    let closing = crate::util::static_regex!(r#"(?m)^[[:space:]]*---[[:space:]]*$"#);

    // editors on some platforms prepend a byte order mark
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let body = match opening.find(raw) {
        Some(m) => &raw[m.end()..],
        None => return Err(eyre!("missing opening frontmatter delimiter")),
    };

    match closing.find(body) {
        Some(m) => {
            let frontmatter = &body[..m.start()];
            let markdown = &body[m.end()..];
            Ok((frontmatter, markdown))
        }
        None => Err(eyre!("missing closing frontmatter delimiter")),
    }
}
