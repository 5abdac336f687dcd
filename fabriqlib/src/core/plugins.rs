pub mod script_engine;

pub use script_engine::{HookProcessor, ScriptEngine, ScriptEngineConfig};

use std::path::PathBuf;
use std::sync::Arc;

use eyre::WrapErr;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::collections::PostCollection;
use crate::core::config::PluginConfig;
use crate::core::engine::GlobalEnginePaths;
use crate::core::library::Library;
use crate::core::post::Post;
use crate::{Result, USER_LOG};

/// Lifecycle stage a hook runs in, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    SitePreparse,
    Post,
    Collection,
    Site,
    Rendering,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SitePreparse => "site_preparse",
            Self::Post => "post",
            Self::Collection => "collection",
            Self::Site => "site",
            Self::Rendering => "rendering",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hook function pointers registered by a plugin script.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub site_preparse: Vec<rhai::FnPtr>,
    pub post: Vec<rhai::FnPtr>,
    pub collection: Vec<rhai::FnPtr>,
    pub site: Vec<rhai::FnPtr>,
    pub render: Vec<rhai::FnPtr>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.site_preparse.is_empty()
            && self.post.is_empty()
            && self.collection.is_empty()
            && self.site.is_empty()
            && self.render.is_empty()
    }
}

/// How a single hook invocation went.
///
/// Scripts signal their result through the return value: unit or `true`
/// count as ok, `false` counts as skipped, a string is an error message,
/// and `on_post` hooks may return a modified post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Skipped,
    Error(String),
}

fn outcome_from(value: &rhai::Dynamic) -> Outcome {
    if value.is_unit() {
        return Outcome::Ok;
    }
    if let Some(flag) = value.clone().try_cast::<bool>() {
        return if flag { Outcome::Ok } else { Outcome::Skipped };
    }
    if let Ok(msg) = value.clone().into_string() {
        return Outcome::Error(msg);
    }
    Outcome::Ok
}

/// Per-stage totals reported in the build recap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl Tally {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Ok => self.ok += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Error(_) => self.errors += 1,
        }
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ok, {} skipped, {} errors",
            self.ok, self.skipped, self.errors
        )
    }
}

/// An extra output page queued by a rendering hook.
#[derive(Debug, Clone, Serialize)]
pub struct ExtraPage {
    pub template: String,
    /// Site-relative output path, e.g. `/sitemap.xml`.
    pub path: String,
    pub context: serde_json::Value,
}

/// Handed to rendering hooks so they can queue additional pages
/// (sitemaps, RSS feeds, search indexes) for the final render.
#[derive(Debug, Clone, Default)]
pub struct RenderApi {
    queued: Arc<Mutex<Vec<ExtraPage>>>,
}

impl RenderApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, page: ExtraPage) {
        self.queued.lock().push(page);
    }

    pub fn drain(&self) -> Vec<ExtraPage> {
        self.queued.lock().drain(..).collect()
    }
}

pub mod render_api {
    use super::{ExtraPage, RenderApi};

    #[allow(clippy::wildcard_imports)]
    use rhai::plugin::*;

    impl RenderApi {
        fn _script_emit_page(
            &mut self,
            template: &str,
            path: &str,
            context: rhai::Dynamic,
        ) -> Result<(), Box<EvalAltResult>> {
            let context: serde_json::Value = rhai::serde::from_dynamic(&context)?;
            self.queue(ExtraPage {
                template: template.to_string(),
                path: path.to_string(),
                context,
            });
            Ok(())
        }
    }

    pub fn register_type(engine: &mut rhai::Engine) {
        engine
            .register_type::<RenderApi>()
            .register_fn("emit_page", RenderApi::_script_emit_page);
    }
}

pub mod script {
    #[allow(clippy::wildcard_imports)]
    use rhai::plugin::*;

    #[rhai::export_module]
    pub mod rhai_module {
        use crate::core::plugins::Hooks;
        use rhai::FnPtr;

        #[rhai_fn(name = "on_site_preparse")]
        pub fn on_site_preparse(hooks: &mut Hooks, hook: FnPtr) {
            hooks.site_preparse.push(hook);
        }

        #[rhai_fn(name = "on_post")]
        pub fn on_post(hooks: &mut Hooks, hook: FnPtr) {
            hooks.post.push(hook);
        }

        #[rhai_fn(name = "on_collection")]
        pub fn on_collection(hooks: &mut Hooks, hook: FnPtr) {
            hooks.collection.push(hook);
        }

        #[rhai_fn(name = "on_site")]
        pub fn on_site(hooks: &mut Hooks, hook: FnPtr) {
            hooks.site.push(hook);
        }

        #[rhai_fn(name = "on_render")]
        pub fn on_render(hooks: &mut Hooks, hook: FnPtr) {
            hooks.render.push(hook);
        }
    }
}

/// A loaded plugin script with its registered hooks.
#[derive(Debug)]
pub struct Plugin {
    name: String,
    processor: HookProcessor,
    hooks: Hooks,
}

impl Plugin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }
}

/// Loads enabled plugin scripts and runs their hooks at each stage.
#[derive(Debug)]
pub struct PluginManager {
    plugins: Vec<Plugin>,
    render_api: RenderApi,
}

impl PluginManager {
    /// Loads `<name>.rhai` scripts from the plugin directory in the
    /// order given by `config.enabled`. Scripts on disk that aren't
    /// enabled are ignored; enabled scripts that are missing are an error.
    pub fn load(
        engine_paths: GlobalEnginePaths,
        config: &PluginConfig,
        script_engine: &ScriptEngine,
    ) -> Result<Self> {
        let mut plugins = vec![];

        for name in &config.enabled {
            let script_path = engine_paths.abs_plugin_dir().join(format!("{name}.rhai"));
            let script = std::fs::read_to_string(&script_path).wrap_err_with(|| {
                format!(
                    "failed reading enabled plugin '{}' at '{}'",
                    name,
                    script_path.display()
                )
            })?;

            let settings = config
                .settings
                .get(name)
                .map(|value| rhai::serde::to_dynamic(value))
                .transpose()
                .wrap_err_with(|| format!("failed converting settings for plugin '{name}'"))?
                .unwrap_or(rhai::Dynamic::UNIT);

            let (processor, hooks) = script_engine
                .load_plugin(&script, settings)
                .wrap_err_with(|| format!("failed loading plugin '{name}'"))?;

            info!(target: USER_LOG, plugin = %name, "loaded plugin");
            plugins.push(Plugin {
                name: name.clone(),
                processor,
                hooks,
            });
        }

        Ok(Self {
            plugins,
            render_api: RenderApi::new(),
        })
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs before any content is parsed. Hooks get the absolute
    /// content directory so they can generate or rewrite source files.
    pub fn run_site_preparse(&self, engine_paths: &GlobalEnginePaths) -> Tally {
        let content_dir = engine_paths.abs_content_dir().display().to_string();
        let mut tally = Tally::default();

        for plugin in &self.plugins {
            for hook in &plugin.hooks.site_preparse {
                let outcome = match plugin.processor.run(hook, (content_dir.clone(),)) {
                    Ok(value) => outcome_from(&value),
                    Err(e) => Outcome::Error(format!("{e:#}")),
                };
                report(plugin, Stage::SitePreparse, &outcome);
                tally.record(&outcome);
            }
        }
        tally
    }

    /// Runs once per post. A hook returning a post replaces the
    /// library entry, so later hooks observe earlier rewrites.
    pub fn run_posts(&self, library: &mut Library) -> Tally {
        let mut tally = Tally::default();
        let keys: Vec<_> = library.iter().map(|(key, _)| key).collect();

        for plugin in &self.plugins {
            for hook in &plugin.hooks.post {
                for key in &keys {
                    let Some(post) = library.get_with_key(*key) else {
                        continue;
                    };
                    let outcome = match plugin.processor.run(hook, (post.clone(),)) {
                        Ok(value) => {
                            if let Some(post) = value.clone().try_cast::<Post>() {
                                library.update(post);
                                Outcome::Ok
                            } else {
                                outcome_from(&value)
                            }
                        }
                        Err(e) => Outcome::Error(format!("{e:#}")),
                    };
                    report(plugin, Stage::Post, &outcome);
                    tally.record(&outcome);
                }
            }
        }
        tally
    }

    /// Runs once per collection group with a read-only summary of it.
    pub fn run_collections<'a, I>(&self, groups: I) -> Tally
    where
        I: Iterator<Item = &'a PostCollection> + Clone,
    {
        let mut tally = Tally::default();

        for plugin in &self.plugins {
            for hook in &plugin.hooks.collection {
                for group in groups.clone() {
                    let summary = serde_json::json!({
                        "kind": group.kind.as_str(),
                        "name": group.name,
                        "slug": group.slug,
                        "post_count": group.len(),
                    });
                    let outcome = match rhai::serde::to_dynamic(&summary)
                        .map_err(|e| eyre::eyre!("{e}"))
                        .and_then(|arg| plugin.processor.run(hook, (arg,)))
                    {
                        Ok(value) => outcome_from(&value),
                        Err(e) => Outcome::Error(format!("{e:#}")),
                    };
                    report(plugin, Stage::Collection, &outcome);
                    tally.record(&outcome);
                }
            }
        }
        tally
    }

    /// Runs once with the whole library after collections are built.
    pub fn run_site(&self, library: &Library) -> Tally {
        let mut tally = Tally::default();

        for plugin in &self.plugins {
            for hook in &plugin.hooks.site {
                let outcome = match plugin.processor.run(hook, (library.clone(),)) {
                    Ok(value) => outcome_from(&value),
                    Err(e) => Outcome::Error(format!("{e:#}")),
                };
                report(plugin, Stage::Site, &outcome);
                tally.record(&outcome);
            }
        }
        tally
    }

    /// Runs after posts are rendered. Hooks queue extra pages through
    /// the render API; the caller drains and renders them.
    pub fn run_rendering(&self) -> (Tally, Vec<ExtraPage>) {
        let mut tally = Tally::default();

        for plugin in &self.plugins {
            for hook in &plugin.hooks.render {
                let outcome = match plugin.processor.run(hook, (self.render_api.clone(),)) {
                    Ok(value) => outcome_from(&value),
                    Err(e) => Outcome::Error(format!("{e:#}")),
                };
                report(plugin, Stage::Rendering, &outcome);
                tally.record(&outcome);
            }
        }
        (tally, self.render_api.drain())
    }
}

fn report(plugin: &Plugin, stage: Stage, outcome: &Outcome) {
    match outcome {
        Outcome::Ok => {}
        Outcome::Skipped => {
            info!(target: USER_LOG, plugin = %plugin.name, %stage, "plugin hook skipped");
        }
        Outcome::Error(msg) => {
            error!(target: USER_LOG, plugin = %plugin.name, %stage, "plugin hook failed: {msg}");
        }
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]

    use super::*;
    use crate::core::collections::SiteCollections;
    use crate::core::config::{CollectionConfig, PluginConfig};
    use crate::core::library::Library;
    use crate::core::post::post::test::minimal_post;
    use std::path::PathBuf;
    use temptree::temptree;

    fn script_engine() -> ScriptEngine {
        ScriptEngine::new(&ScriptEngineConfig::new().modules())
    }

    fn load_manager(scripts: &[(&str, &str)], enabled: &[&str]) -> PluginManager {
        let tree = temptree! {
            content: {},
            templates: {},
            public: {},
            plugins: {},
            logs: {},
        };
        for (name, body) in scripts {
            std::fs::write(
                tree.path().join("plugins").join(format!("{name}.rhai")),
                body,
            )
            .unwrap();
        }
        let paths = crate::test::default_test_paths(&tree);
        let config = PluginConfig {
            enabled: enabled.iter().map(ToString::to_string).collect(),
            ..PluginConfig::default()
        };
        PluginManager::load(paths, &config, &script_engine()).unwrap()
    }

    #[test]
    fn loads_enabled_plugins_in_order() {
        let manager = load_manager(
            &[("beta", ""), ("alpha", ""), ("ignored", "")],
            &["beta", "alpha"],
        );
        let names: Vec<_> = manager.plugins().iter().map(Plugin::name).collect();
        assert_eq!(names, vec!["beta", "alpha"]);
    }

    #[test]
    fn missing_enabled_plugin_is_an_error() {
        let tree = temptree! {
            content: {},
            templates: {},
            public: {},
            plugins: {},
            logs: {},
        };
        let paths = crate::test::default_test_paths(&tree);
        let config = PluginConfig {
            enabled: vec!["ghost".into()],
            ..PluginConfig::default()
        };
        let manager = PluginManager::load(paths, &config, &script_engine());
        assert!(manager.is_err());
    }

    #[test]
    fn post_hook_rewrites_posts() {
        let script = r#"
            plugin.on_post(|post| {
                post.set_meta("touched", true);
                post
            });
        "#;
        let manager = load_manager(&[("touch", script)], &["touch"]);

        let mut library = Library::new();
        library.insert(minimal_post());

        let tally = manager.run_posts(&mut library);
        assert_eq!(tally.ok, 1);
        assert_eq!(tally.errors, 0);

        let post = library.get(&"/doc/".into()).unwrap();
        assert_eq!(post.frontmatter.meta["touched"], serde_json::json!(true));
    }

    #[test]
    fn false_return_counts_as_skipped() {
        let script = r#"plugin.on_post(|post| { false });"#;
        let manager = load_manager(&[("skipper", script)], &["skipper"]);

        let mut library = Library::new();
        library.insert(minimal_post());

        let tally = manager.run_posts(&mut library);
        assert_eq!(tally.skipped, 1);
    }

    #[test]
    fn string_return_counts_as_error() {
        let script = r#"plugin.on_post(|post| { "kaboom" });"#;
        let manager = load_manager(&[("bomb", script)], &["bomb"]);

        let mut library = Library::new();
        library.insert(minimal_post());

        let tally = manager.run_posts(&mut library);
        assert_eq!(tally.errors, 1);
    }

    #[test]
    fn collection_hook_sees_group_summaries() {
        let script = r#"
            plugin.on_collection(|group| {
                if group.kind == "tag" && group.post_count > 0 {
                    true
                } else {
                    false
                }
            });
        "#;
        let manager = load_manager(&[("counter", script)], &["counter"]);

        let mut library = Library::new();
        let mut post = minimal_post();
        post.frontmatter.tags = vec!["rust".into()];
        library.insert(post);

        let collections = SiteCollections::from_library(&library, &CollectionConfig::default());
        let tally = manager.run_collections(collections.iter_groups());
        assert_eq!(tally.ok, 1);
        // the template group reports as skipped
        assert_eq!(tally.skipped, 1);
    }

    #[test]
    fn site_hook_reads_library() {
        let script = r#"
            plugin.on_site(|library| {
                library.get("/doc/") != ()
            });
        "#;
        let manager = load_manager(&[("reader", script)], &["reader"]);

        let mut library = Library::new();
        library.insert(minimal_post());

        let tally = manager.run_site(&library);
        assert_eq!(tally.ok, 1);
    }

    #[test]
    fn render_hook_queues_extra_pages() {
        let script = r#"
            plugin.on_render(|api| {
                api.emit_page("sitemap.html", "/sitemap.xml", #{ "entries": 3 });
            });
        "#;
        let manager = load_manager(&[("sitemap", script)], &["sitemap"]);

        let (tally, pages) = manager.run_rendering();
        assert_eq!(tally.ok, 1);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].template, "sitemap.html");
        assert_eq!(pages[0].path, "/sitemap.xml");
        assert_eq!(pages[0].context["entries"], serde_json::json!(3));
    }
}
