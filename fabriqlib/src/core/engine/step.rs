use std::{ffi::OsStr, path::PathBuf, time::Instant};

use eyre::WrapErr;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    core::collections::{group_url, PostCollection},
    core::config::SiteConfig,
    core::library::Library,
    core::plugins::ExtraPage,
    core::post::{Post, RenderedPage, RenderedPageCollection},
    discover,
    render::template::TemplateName,
    site_context::SiteContext,
    Renderers, Result, USER_LOG,
};

use super::{Engine, GlobalEnginePaths, Timings};

pub mod report {
    use eyre::bail;
    use tracing::{error, info, warn};

    use crate::core::collections::SiteCollections;
    use crate::core::engine::Timings;
    use crate::core::library::Library;
    use crate::core::plugins::{Stage, Tally};
    use crate::linter::{LintLevel, LintResults};
    use crate::{Result, USER_LOG};

    pub fn lints(lints: &LintResults) -> Result<()> {
        let mut abort = false;
        for lint in lints {
            let doc = lint.rel_path.display();
            match lint.level {
                LintLevel::Allow => {}
                LintLevel::Warn => {
                    warn!(target: USER_LOG, code = %lint.code, lint = %lint.msg, %doc);
                }
                LintLevel::Deny => {
                    error!(target: USER_LOG, code = %lint.code, lint = %lint.msg, %doc);
                    abort = true;
                }
            }
        }
        if abort {
            bail!("lint errors encountered while building site");
        }
        Ok(())
    }

    pub fn summary(
        library: &Library,
        collections: &SiteCollections,
        tallies: &[(Stage, Tally)],
        timings: &Timings,
    ) {
        info!(
            target: USER_LOG,
            posts = library.len(),
            tags = collections.tags.len(),
            categories = collections.categories.len(),
            templates = collections.templates.len(),
            microdata = collections.microdata.len(),
            total_ms = timings.total().as_millis() as u64,
            "build finished ({timings})"
        );
        for (stage, tally) in tallies {
            if *tally != Tally::default() {
                info!(target: USER_LOG, %stage, "plugin hooks: {tally}");
            }
        }
    }
}

/// Runs a build stage and records how long it took.
pub fn timed<T, F>(timings: &mut Timings, stage: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let started = Instant::now();
    let value = f()?;
    timings.record(stage, started.elapsed());
    Ok(value)
}

/// Parses every markdown file under the content directory into a
/// library, in parallel. Documents that fail to parse are skipped with
/// a warning, as are hidden and future-dated posts.
pub fn build_library(
    engine_paths: GlobalEnginePaths,
    renderers: &Renderers,
    config: &SiteConfig,
) -> Result<Library> {
    info!(target: USER_LOG, "discovering content");

    let content_dir = engine_paths.abs_content_dir();
    let markdown_files = discover::get_all_paths(&content_dir, &|path| {
        path.extension() == Some(OsStr::new("md"))
    })
    .wrap_err_with(|| {
        format!(
            "failed to discover documents under '{}'",
            content_dir.display()
        )
    })?;

    let rel_paths: Vec<PathBuf> = markdown_files
        .iter()
        .map(|abs| {
            abs.strip_prefix(&content_dir)
                .map(std::path::Path::to_path_buf)
                .wrap_err_with(|| {
                    format!("discovered document '{}' outside content dir", abs.display())
                })
        })
        .try_collect()?;

    info!(target: USER_LOG, docs = rel_paths.len(), "parsing content");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .wrap_err("failed building worker pool for content parsing")?;

    let posts: Vec<(PathBuf, Result<Post>)> = pool.install(|| {
        rel_paths
            .par_iter()
            .map(|rel_path| {
                let post = Post::from_file(
                    engine_paths.clone(),
                    rel_path,
                    renderers,
                    &config.parser,
                );
                (rel_path.clone(), post)
            })
            .collect()
    });

    let now_ts = chrono::Utc::now().timestamp();
    let mut library = Library::new();

    for (rel_path, post) in posts {
        match post {
            Ok(post) if post.is_published(now_ts) => {
                library.insert(post);
            }
            Ok(post) => {
                debug!(
                    target: USER_LOG,
                    doc = %rel_path.display(),
                    hidden = post.frontmatter.hidden,
                    "skipping unpublished post"
                );
            }
            Err(e) => {
                warn!(
                    target: USER_LOG,
                    doc = %rel_path.display(),
                    "failed to parse document, skipping: {e:#}"
                );
            }
        }
    }

    Ok(library)
}

/// Removes any previous build output so deleted posts don't linger.
pub fn clean_output_dir(engine_paths: &GlobalEnginePaths) -> Result<()> {
    let output_dir = engine_paths.abs_output_dir();
    if output_dir.exists() {
        std::fs::remove_dir_all(&output_dir).wrap_err_with(|| {
            format!(
                "failed removing stale output directory '{}'",
                output_dir.display()
            )
        })?;
    }
    crate::util::make_parent_dirs(&output_dir)
}

pub fn render_posts(engine: &Engine) -> Result<RenderedPageCollection> {
    info!(target: USER_LOG, "rendering posts");

    let rendered: Vec<RenderedPage> = engine
        .library()
        .iter()
        .map(|(_, post)| crate::core::post::render(engine, post))
        .try_collect()
        .wrap_err("Failed building rendered post collection")?;

    Ok(RenderedPageCollection::from_vec(rendered))
}

/// Renders the tag and category index pages. Groups are skipped when
/// the site doesn't ship the corresponding template, as are groups
/// with fewer than `min_posts` posts.
pub fn render_collection_indexes(engine: &Engine) -> Result<RenderedPageCollection> {
    info!(target: USER_LOG, "rendering collection indexes");

    let config = &engine.config().collections;
    let mut rendered = RenderedPageCollection::new();

    let jobs = [
        (
            engine.collections().tags.values(),
            TemplateName::new(&config.tag_template),
            config.tag_output_dir.as_path(),
        ),
        (
            engine.collections().categories.values(),
            TemplateName::new(&config.category_template),
            config.category_output_dir.as_path(),
        ),
    ];

    for (groups, template, output_dir) in jobs {
        if !engine.renderers().tera().has_template(&template) {
            debug!(
                target: USER_LOG,
                %template,
                "no collection template, skipping index pages"
            );
            continue;
        }
        for group in groups {
            if group.len() < config.min_posts {
                continue;
            }
            rendered.push(render_collection_index(engine, group, &template, output_dir)?);
        }
    }

    Ok(rendered)
}

fn render_collection_index(
    engine: &Engine,
    group: &PostCollection,
    template: &TemplateName,
    output_dir: &std::path::Path,
) -> Result<RenderedPage> {
    let mut tera_ctx = tera::Context::new();
    tera_ctx.insert("site", &SiteContext::from(&engine.config().site));
    tera_ctx.insert(
        "collection",
        &serde_json::json!({
            "kind": group.kind.as_str(),
            "name": group.name,
            "slug": group.slug,
            "url": group_url(output_dir, &group.slug),
        }),
    );
    tera_ctx.insert(
        "posts",
        &group
            .post_keys
            .iter()
            .filter_map(|key| engine.library().get_with_key(*key))
            .collect::<Vec<_>>(),
    );

    let html = engine
        .renderers()
        .tera()
        .render(template, &tera_ctx)
        .wrap_err_with(|| {
            format!(
                "failed rendering index page for {} '{}'",
                group.kind, group.name
            )
        })?;

    let mut target = engine.paths().abs_output_dir().join(output_dir);
    target.push(&group.slug);
    target.push("index.html");

    Ok(RenderedPage::new(Default::default(), html, target))
}

/// Renders pages queued by plugin rendering hooks.
pub fn render_extra_pages(
    engine: &Engine,
    extra_pages: Vec<ExtraPage>,
) -> Result<RenderedPageCollection> {
    if !extra_pages.is_empty() {
        info!(target: USER_LOG, pages = extra_pages.len(), "rendering plugin pages");
    }

    let mut rendered = RenderedPageCollection::new();

    for page in extra_pages {
        let template = TemplateName::new(&page.template);

        let mut tera_ctx = tera::Context::from_serialize(&page.context)
            .wrap_err_with(|| format!("bad context for plugin page '{}'", page.path))?;
        tera_ctx.insert("site", &SiteContext::from(&engine.config().site));

        let html = engine
            .renderers()
            .tera()
            .render(&template, &tera_ctx)
            .wrap_err_with(|| format!("failed rendering plugin page '{}'", page.path))?;

        let mut target = engine.paths().abs_output_dir();
        for segment in page.path.split('/').filter(|s| !s.is_empty()) {
            target.push(segment);
        }
        if page.path.ends_with('/') {
            target.push("index.html");
        }

        rendered.push(RenderedPage::new(Default::default(), html, target));
    }

    Ok(rendered)
}
