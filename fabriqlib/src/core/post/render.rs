use eyre::WrapErr;

use tracing::{instrument, trace};

use crate::{
    core::{engine::Engine, post::PostKey, Post},
    site_context::SiteContext,
    Result,
};

use std::path::{Path, PathBuf};

/// Renders a single post through its template.
#[instrument(skip_all, fields(post = %post.rel_path.display()))]
pub fn render(engine: &Engine, post: &Post) -> Result<RenderedPage> {
    trace!("rendering post");

    let template = post.template_name();
    let mut tera_ctx = tera::Context::new();

    // global site context (from site.yaml)
    tera_ctx.insert("site", &SiteContext::from(&engine.config().site));

    // collections built from all published posts. each group kind is also
    // exposed at the top level so templates can write `{% for tag in tags %}`
    let collections_ctx = engine
        .collections()
        .context(engine.library(), &engine.config().collections);
    for kind in ["tags", "categories", "templates", "microdata"] {
        if let Some(groups) = collections_ctx.get(kind) {
            tera_ctx.insert(kind, groups);
        }
    }
    tera_ctx.insert("collections", &collections_ctx);

    // the post itself: frontmatter fields, permalink, and reading stats
    tera_ctx.insert("post", &post_context(post));
    tera_ctx.insert("stats", &post.stats);
    tera_ctx.insert("meta", &post.frontmatter);

    // the rendered markdown content
    tera_ctx.insert("content", &post.html);
    tera_ctx.insert("toc", &post.toc);

    // the `meta` frontmatter section where users can define anything they want
    {
        let meta_ctx = tera::Context::from_serialize(&post.frontmatter.meta)
            .wrap_err("failed converting post metadata into tera context")?;
        tera_ctx.extend(meta_ctx);
    }

    engine
        .renderers()
        .tera()
        .render(&template, &tera_ctx)
        .map(|html| RenderedPage::new(post.post_key, html, post.target()))
        .wrap_err_with(|| {
            format!(
                "failed rendering post '{}' with template '{}'",
                post.rel_path.display(),
                template
            )
        })
}

fn post_context(post: &Post) -> serde_json::Value {
    serde_json::json!({
        "title": post.frontmatter.title,
        "author": post.frontmatter.author,
        "description": post.frontmatter.description,
        "category": post.frontmatter.category,
        "tags": post.frontmatter.tags,
        "microdata_type": post.frontmatter.microdata_type,
        "creation_date": post.frontmatter.creation_date,
        "update_date": post.frontmatter.update_date,
        "permalink": post.permalink(),
        "word_count": post.stats.num_words,
        "read_time": post.stats.read_time_minutes,
    })
}

#[derive(Debug)]
pub struct RenderedPage {
    post_key: PostKey,
    html: String,
    target: PathBuf,
}

impl RenderedPage {
    pub fn new<S: Into<String>>(post_key: PostKey, html: S, target: PathBuf) -> Self {
        Self {
            post_key,
            html: html.into(),
            target,
        }
    }

    pub fn post_key(&self) -> PostKey {
        self.post_key
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn html(&self) -> &str {
        self.html.as_str()
    }
}

#[derive(Debug, Default)]
pub struct RenderedPageCollection {
    pages: Vec<RenderedPage>,
}

impl RenderedPageCollection {
    pub fn new() -> Self {
        Self { pages: vec![] }
    }

    pub fn push(&mut self, page: RenderedPage) {
        self.pages.push(page);
    }

    pub fn from_vec(pages: Vec<RenderedPage>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn write_to_disk(&self) -> Result<()> {
        use std::fs;
        for page in &self.pages {
            if let Some(parent_dir) = page.target().parent() {
                crate::util::make_parent_dirs(parent_dir).wrap_err_with(|| {
                    format!(
                        "failed making parent directories at '{}' when writing rendered pages",
                        parent_dir.display()
                    )
                })?;
            }
            fs::write(page.target(), &page.html).wrap_err_with(|| {
                format!(
                    "failed to write rendered page to '{}'",
                    page.target().display()
                )
            })?;
        }

        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderedPage> {
        self.pages.iter()
    }
}

impl IntoIterator for RenderedPageCollection {
    type Item = RenderedPage;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

impl<'a> IntoIterator for &'a RenderedPageCollection {
    type Item = &'a RenderedPage;
    type IntoIter = std::slice::Iter<'a, RenderedPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    #![allow(warnings, unused)]

    use super::*;
    use crate::core::post::post::test::minimal_post;
    use temptree::temptree;

    #[test]
    fn writes_rendered_pages_to_disk() {
        let tree = temptree! {
            public: {},
        };

        let post = minimal_post();
        let target = tree.path().join("public").join("doc").join("index.html");
        let rendered = RenderedPage::new(post.post_key, "<p>hi</p>", target.clone());

        let collection = RenderedPageCollection::from_vec(vec![rendered]);
        collection.write_to_disk().expect("failed to write pages");

        let html = std::fs::read_to_string(target).unwrap();
        assert_eq!(html, "<p>hi</p>");
    }
}
