use eyre::WrapErr;
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{instrument, trace};

use crate::{
    core::collections::SiteCollections,
    core::config::SiteConfig,
    core::library::Library,
    core::plugins::{PluginManager, ScriptEngine, ScriptEngineConfig, Stage, Tally},
    linter::{LintContext, LintResults, Linter},
    render::Renderers,
    Result,
};

pub mod step;

pub type GlobalEnginePaths = Arc<EnginePaths>;

/// Absolute locations of everything the engine touches, derived from
/// the project root and the `dirs` section of `site.yaml`.
#[derive(Debug, Clone, Serialize)]
pub struct EnginePaths {
    project_root: PathBuf,
    content_dir: PathBuf,
    template_dir: PathBuf,
    output_dir: PathBuf,
    plugin_dir: PathBuf,
    log_dir: PathBuf,
}

impl EnginePaths {
    pub fn new(project_root: PathBuf, config: &SiteConfig) -> Self {
        Self {
            content_dir: config.dirs.content.clone(),
            template_dir: config.dirs.templates.clone(),
            output_dir: config.dirs.output.clone(),
            plugin_dir: config.plugins.dir.clone(),
            log_dir: config.dirs.logs.clone(),
            project_root,
        }
    }

    pub fn from_config(project_root: &Path, config: &SiteConfig) -> GlobalEnginePaths {
        Arc::new(Self::new(project_root.to_path_buf(), config))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }
    pub fn abs_content_dir(&self) -> PathBuf {
        self.project_root.join(&self.content_dir)
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }
    pub fn abs_template_dir(&self) -> PathBuf {
        self.project_root.join(&self.template_dir)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
    pub fn abs_output_dir(&self) -> PathBuf {
        self.project_root.join(&self.output_dir)
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }
    pub fn abs_plugin_dir(&self) -> PathBuf {
        self.project_root.join(&self.plugin_dir)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
    pub fn abs_log_dir(&self) -> PathBuf {
        self.project_root.join(&self.log_dir)
    }
}

/// Wall-clock durations for each build stage, reported in the recap.
#[derive(Debug, Clone, Default)]
pub struct Timings {
    entries: Vec<(String, Duration)>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<S: Into<String>>(&mut self, stage: S, elapsed: Duration) {
        self.entries.push((stage.into(), elapsed));
    }

    pub fn entries(&self) -> &[(String, Duration)] {
        &self.entries
    }

    pub fn total(&self) -> Duration {
        self.entries.iter().map(|(_, d)| *d).sum()
    }
}

impl std::fmt::Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages = self
            .entries
            .iter()
            .map(|(stage, elapsed)| format!("{stage}: {}ms", elapsed.as_millis()))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{stages}")
    }
}

#[derive(Debug)]
pub struct Engine {
    paths: GlobalEnginePaths,
    config: SiteConfig,
    renderers: Renderers,

    plugins: PluginManager,
    linter: Linter,

    // populated by `load_content`
    library: Library,
    collections: SiteCollections,
    tallies: Vec<(Stage, Tally)>,
}

impl Engine {
    pub fn new(paths: GlobalEnginePaths, config: SiteConfig) -> Result<Engine> {
        let renderers = Renderers::new(paths.clone()).wrap_err_with(|| {
            format!(
                "failed initializing renderers using template root '{}'",
                paths.abs_template_dir().display()
            )
        })?;

        let script_engine = ScriptEngine::new(&ScriptEngineConfig::new().modules());

        let plugins = PluginManager::load(paths.clone(), &config.plugins, &script_engine)
            .wrap_err("failed loading plugins when initializing engine")?;

        let linter = Linter::new(&config.linter)
            .wrap_err("failed building linter when initializing engine")?;

        Ok(Self {
            paths,
            config,
            renderers,

            plugins,
            linter,

            library: Library::new(),
            collections: SiteCollections::default(),
            tallies: vec![],
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn renderers(&self) -> &Renderers {
        &self.renderers
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    pub fn collections(&self) -> &SiteCollections {
        &self.collections
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn linter(&self) -> &Linter {
        &self.linter
    }

    pub fn paths(&self) -> GlobalEnginePaths {
        Arc::clone(&self.paths)
    }

    /// Per-stage plugin hook totals from the most recent build.
    pub fn plugin_tallies(&self) -> &[(Stage, Tally)] {
        &self.tallies
    }

    /// Runs the preparse hooks, parses all published content into the
    /// library, runs the post/collection/site hooks, and builds the
    /// collections. Everything up to (but excluding) rendering.
    pub fn load_content(&mut self, timings: &mut Timings) -> Result<()> {
        self.tallies.clear();

        let tally = step::timed(timings, "preparse", || {
            Ok(self.plugins.run_site_preparse(&self.paths))
        })?;
        self.tallies.push((Stage::SitePreparse, tally));

        self.library = step::timed(timings, "parse", || {
            step::build_library(self.paths(), &self.renderers, &self.config)
        })?;

        let tally = step::timed(timings, "process", || {
            Ok(self.plugins.run_posts(&mut self.library))
        })?;
        self.tallies.push((Stage::Post, tally));

        let (collections, tally) = step::timed(timings, "collections", || {
            let collections =
                SiteCollections::from_library(&self.library, &self.config.collections);
            let tally = self.plugins.run_collections(collections.iter_groups());
            Ok((collections, tally))
        })?;
        self.collections = collections;
        self.tallies.push((Stage::Collection, tally));

        let tally = step::timed(timings, "site", || Ok(self.plugins.run_site(&self.library)))?;
        self.tallies.push((Stage::Site, tally));

        Ok(())
    }

    /// Lints every post in the library. `load_content` must run first.
    pub fn run_lints(&self) -> LintResults {
        let ctx = LintContext::new(&self.library, self.renderers.tera().get_template_names());

        let mut results = LintResults::new();
        for (_, post) in &self.library {
            results.extend(self.linter.lint(&ctx, post));
        }
        results
    }

    /// Full build: load content, lint, render everything to the output
    /// directory. Returns stage timings for the recap.
    #[instrument(skip_all)]
    pub fn build_site(&mut self) -> Result<Timings> {
        trace!("running build");
        let mut timings = Timings::new();

        self.load_content(&mut timings)?;

        step::timed(&mut timings, "lint", || {
            let lints = self.run_lints();
            step::report::lints(&lints)
        })?;

        step::clean_output_dir(&self.paths)
            .wrap_err("Failed cleaning output directory during site build")?;

        step::timed(&mut timings, "render", || {
            step::render_posts(self)
                .wrap_err("Failed to render posts during site build")?
                .write_to_disk()
                .wrap_err("Failed to write rendered posts to disk during site build")
        })?;

        step::timed(&mut timings, "finale", || {
            step::render_collection_indexes(self)
                .wrap_err("Failed to render collection index pages during site build")?
                .write_to_disk()
                .wrap_err("Failed to write collection index pages during site build")?;

            let (tally, extra_pages) = self.plugins.run_rendering();
            self.tallies.push((Stage::Rendering, tally));
            step::render_extra_pages(self, extra_pages)
                .wrap_err("Failed to render plugin pages during site build")?
                .write_to_disk()
                .wrap_err("Failed to write plugin pages during site build")
        })?;

        step::report::summary(&self.library, &self.collections, &self.tallies, &timings);

        Ok(timings)
    }
}

#[cfg(test)]
pub mod test {

    #![allow(warnings, unused)]

    use temptree::temptree;

    use super::*;
    use crate::core::config::SiteConfig;

    fn new_engine(tree: &tempfile::TempDir) -> Engine {
        new_engine_with_config(tree, SiteConfig::default())
    }

    fn new_engine_with_config(tree: &tempfile::TempDir, config: SiteConfig) -> Engine {
        let paths = crate::test::default_test_paths(tree);
        Engine::new(paths, config).expect("failed to create engine")
    }

    #[test]
    fn makes_new_engine() {
        let tree = temptree! {
            content: {},
            templates: {},
            public: {},
            plugins: {},
            logs: {},
        };
        new_engine(&tree);
    }

    #[test]
    fn builds_minimal_site() {
        let doc = r#"---
title: hello
---
content here"#;
        let tree = temptree! {
            content: {
                "hello.md": doc,
            },
            templates: {
                "post.html": "<main>{{ content | safe }}</main>",
            },
            public: {},
            plugins: {},
            logs: {},
        };

        let mut engine = new_engine(&tree);
        engine.build_site().expect("failed to build site");

        let html = std::fs::read_to_string(tree.path().join("public/hello/index.html"))
            .expect("missing rendered post");
        assert!(html.contains("<main>"));
        assert!(html.contains("content here"));
    }

    #[test]
    fn hidden_posts_are_not_rendered() {
        let hidden = "---\ntitle: secret\nhidden: true\n---\nshhh";
        let tree = temptree! {
            content: {
                "secret.md": hidden,
            },
            templates: {
                "post.html": "{{ content | safe }}",
            },
            public: {},
            plugins: {},
            logs: {},
        };

        let mut engine = new_engine(&tree);
        engine.build_site().expect("failed to build site");

        assert!(!tree.path().join("public/secret").exists());
    }

    #[test]
    fn deny_lint_aborts_build() {
        // E100 (missing title) denies by default
        let doc = "---\ndescription: no title here\n---\ncontent";
        let tree = temptree! {
            content: {
                "doc.md": doc,
            },
            templates: {
                "post.html": "{{ content | safe }}",
            },
            public: {},
            plugins: {},
            logs: {},
        };

        let mut engine = new_engine(&tree);
        assert!(engine.build_site().is_err());
    }

    #[test]
    fn timings_display_lists_stages() {
        let mut timings = Timings::new();
        timings.record("parse", Duration::from_millis(5));
        timings.record("render", Duration::from_millis(7));
        assert_eq!(timings.to_string(), "parse: 5ms, render: 7ms");
        assert_eq!(timings.total(), Duration::from_millis(12));
    }

    #[test]
    fn records_plugin_tallies_during_build() {
        let plugin = r#"
            plugin.on_post(|post| { true });
        "#;
        let tree = temptree! {
            content: {
                "doc.md": "---\ntitle: doc\n---\ncontent",
            },
            templates: {
                "post.html": "{{ content | safe }}",
            },
            public: {},
            plugins: {
                "noop.rhai": plugin,
            },
            logs: {},
        };

        let mut config = SiteConfig::default();
        config.plugins.enabled = vec!["noop".into()];

        let mut engine = new_engine_with_config(&tree, config);
        engine.build_site().expect("failed to build site");

        let post_tally = engine
            .plugin_tallies()
            .iter()
            .find(|(stage, _)| *stage == crate::core::plugins::Stage::Post)
            .map(|(_, tally)| *tally)
            .expect("missing post stage tally");
        assert_eq!(post_tally.ok, 1);
        assert_eq!(post_tally.errors, 0);
    }

    #[test]
    fn engine_paths_join_project_root() {
        let paths = EnginePaths::new(PathBuf::from("/site"), &SiteConfig::default());
        assert_eq!(paths.abs_content_dir(), PathBuf::from("/site/content"));
        assert_eq!(paths.abs_template_dir(), PathBuf::from("/site/templates"));
        assert_eq!(paths.abs_output_dir(), PathBuf::from("/site/public"));
        assert_eq!(paths.abs_plugin_dir(), PathBuf::from("/site/plugins"));
        assert_eq!(paths.abs_log_dir(), PathBuf::from("/site/logs"));
    }
}
