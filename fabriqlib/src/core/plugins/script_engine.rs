use rhai::packages::{Package, StandardPackage};
#[allow(clippy::wildcard_imports)]
use rhai::plugin::*;
use rhai::{def_package, Scope};

use eyre::WrapErr;

use crate::core::plugins::Hooks;
use crate::Result;

def_package! {
    /// Everything plugin scripts get access to: the standard library,
    /// the hook registry, and the post type.
    pub FabriqPackage(module) {
        StandardPackage::init(module);

        combine_with_exported_module!(module, "plugin", crate::core::plugins::script::rhai_module);
        combine_with_exported_module!(module, "frontmatter", crate::core::post::script::rhai_module);
    }
}

pub struct ScriptEngineConfig {
    package: FabriqPackage,
}

impl ScriptEngineConfig {
    pub fn new() -> Self {
        Self {
            package: FabriqPackage::new(),
        }
    }

    pub fn modules(&self) -> Vec<rhai::Shared<Module>> {
        vec![self.package.as_shared_module()]
    }
}

impl Default for ScriptEngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ScriptEngine {
    engine: rhai::Engine,
    packages: Vec<rhai::Shared<Module>>,
}

impl ScriptEngine {
    pub fn new(packages: &[rhai::Shared<Module>]) -> Self {
        let engine = Self::new_engine(packages);

        Self {
            engine,
            packages: packages.into(),
        }
    }

    fn register_types(engine: &mut rhai::Engine) {
        crate::core::library::script::register_type(engine);
        crate::core::plugins::render_api::register_type(engine);
    }

    fn new_engine(packages: &[rhai::Shared<Module>]) -> rhai::Engine {
        let mut engine = rhai::Engine::new_raw();
        for pkg in packages {
            engine.register_global_module(pkg.clone());
        }

        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(64);
        engine.set_max_operations(100_000);
        engine.set_max_modules(100);
        engine.on_print(|x| println!("script engine: {}", x));
        engine.on_debug(move |s, src, pos| {
            println!("{} @ {:?} > {}", src.unwrap_or("unknown"), pos, s);
        });

        ScriptEngine::register_types(&mut engine);

        engine
    }

    pub fn clone_engine(&self) -> rhai::Engine {
        Self::new_engine(&self.packages)
    }

    fn new_scope(settings: rhai::Dynamic) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push("plugin", Hooks::new());
        scope.push("settings", settings);
        scope
    }

    /// Compiles and runs a plugin script, returning the hooks it
    /// registered plus a processor that can call them later.
    pub fn load_plugin<S: AsRef<str>>(
        &self,
        script: S,
        settings: rhai::Dynamic,
    ) -> Result<(HookProcessor, Hooks)> {
        let script = script.as_ref();
        let ast = self
            .engine
            .compile(script)
            .wrap_err("Failed to compile plugin script")?;

        let mut scope = Self::new_scope(settings);

        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .wrap_err("Failed running plugin script body")?;

        let hooks = scope
            .get_value("plugin")
            .expect("the plugin handle is always pushed into scope. this is a bug");

        let processor = {
            let new_engine = Self::new_engine(&self.packages);
            HookProcessor::new(new_engine, script)?
        };
        Ok((processor, hooks))
    }
}

/// Calls hook function pointers registered by a plugin script.
#[derive(Debug)]
pub struct HookProcessor {
    engine: rhai::Engine,
    ast: rhai::AST,
}

impl HookProcessor {
    pub fn new<S: AsRef<str>>(engine: rhai::Engine, script: S) -> Result<Self> {
        let ast = engine
            .compile(script.as_ref())
            .wrap_err("Failed to compile an AST from plugin script")?;
        Ok(Self { engine, ast })
    }

    pub fn run<A: rhai::FuncArgs>(&self, ptr: &rhai::FnPtr, args: A) -> Result<rhai::Dynamic> {
        ptr.call::<rhai::Dynamic>(&self.engine, &self.ast, args)
            .wrap_err("Failed to call hook function in plugin script")
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;

    fn script_engine() -> ScriptEngine {
        ScriptEngine::new(&ScriptEngineConfig::new().modules())
    }

    #[test]
    fn default_script_engine_config() {
        ScriptEngineConfig::default();
    }

    #[test]
    fn scope_contains_proper_items() {
        let scope = ScriptEngine::new_scope(rhai::Dynamic::UNIT);
        let required_items = &["plugin", "settings"];
        for item in required_items {
            assert!(scope.contains(item));
        }
    }

    #[test]
    fn loads_empty_plugin() {
        let engine = script_engine();
        let (_, hooks) = engine
            .load_plugin("", rhai::Dynamic::UNIT)
            .expect("failed to load empty plugin");
        assert!(hooks.is_empty());
    }

    #[test]
    fn registers_post_hook() {
        let engine = script_engine();
        let (_, hooks) = engine
            .load_plugin(r#"plugin.on_post(|post| { true });"#, rhai::Dynamic::UNIT)
            .expect("failed to load plugin");
        assert_eq!(hooks.post.len(), 1);
    }

    #[test]
    fn plugin_reads_settings() {
        let engine = script_engine();
        let settings: rhai::Dynamic =
            rhai::serde::to_dynamic(serde_json::json!({ "depth": 3 })).unwrap();
        let script = r#"
            if settings.depth != 3 {
                throw "bad settings";
            }
        "#;
        engine
            .load_plugin(script, settings)
            .expect("failed to load plugin with settings");
    }

    #[test]
    fn clones_engine() {
        let engine = script_engine();
        engine.clone_engine();
    }
}
