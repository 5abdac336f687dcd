use eyre::WrapErr;
use parking_lot::Mutex;

use std::sync::Arc;
use tera::Tera;

use crate::core::engine::GlobalEnginePaths;
use crate::Result;

use super::TemplateName;

/// Template engine wrapper. Templates are HTML files discovered under
/// the configured template directory.
#[derive(Debug)]
pub struct TeraRenderer {
    renderer: Arc<Mutex<Tera>>,
}

impl TeraRenderer {
    pub fn new(engine_paths: GlobalEnginePaths) -> Result<Self> {
        let root = engine_paths.abs_template_dir().join("**/*.html");

        let mut tera = Tera::new(root.display().to_string().as_str())
            .wrap_err("error initializing template rendering engine")?;

        register_builtin_functions(engine_paths, &mut tera);

        Ok(Self {
            renderer: Arc::new(Mutex::new(tera)),
        })
    }

    pub fn render(&self, template: &TemplateName, context: &tera::Context) -> Result<String> {
        let renderer = self.renderer.lock();
        Ok(renderer.render(template.as_ref(), context)?)
    }

    /// Renders a one-off template string.
    pub fn one_off<S: AsRef<str>>(&self, input: S, context: &tera::Context) -> Result<String> {
        let mut renderer = self.renderer.lock();
        Ok(renderer.render_str(input.as_ref(), context)?)
    }

    pub fn has_template(&self, template: &TemplateName) -> bool {
        let renderer = self.renderer.lock();
        let found = renderer
            .get_template_names()
            .any(|name| name == template.as_str());
        drop(renderer);
        found
    }

    pub fn get_template_names(&self) -> Vec<String> {
        let renderer = self.renderer.lock();
        renderer
            .get_template_names()
            .map(|s| s.to_string())
            .collect()
    }
}

fn register_builtin_functions(engine_paths: GlobalEnginePaths, tera: &mut Tera) {
    #[allow(clippy::wildcard_imports)]
    use functions::*;

    let include_file = IncludeFile::new(engine_paths);
    tera.register_function(IncludeFile::NAME, include_file);
}

mod functions {
    use std::collections::HashMap;
    use std::path::Path;

    use crate::core::engine::GlobalEnginePaths;

    pub struct IncludeFile {
        engine_paths: GlobalEnginePaths,
    }

    impl IncludeFile {
        pub const NAME: &'static str = "include_file";

        pub fn new(engine_paths: GlobalEnginePaths) -> Self {
            Self { engine_paths }
        }
    }

    impl tera::Function for IncludeFile {
        fn call(&self, args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
            let path = {
                let path: &str = args
                    .get("path")
                    .ok_or_else(|| tera::Error::msg("`path` required to include file in template"))?
                    .as_str()
                    .ok_or_else(|| {
                        format!(
                            "failed to interpret path '{}' as a string",
                            args.get("path").unwrap(),
                        )
                    })?;

                let relative_to_project_root = Path::new(path)
                    .strip_prefix("/")
                    .map_err(|_| {
                        tera::Error::msg(
                            "'path' must be absolute (starting from project directory)",
                        )
                    })?;

                self.engine_paths.project_root().join(relative_to_project_root)
            };

            if !path.is_file() {
                return Err(tera::Error::msg(format!(
                    "no file at '{}'",
                    path.display()
                )));
            }

            let content = std::fs::read_to_string(&path).map_err(|e| {
                tera::Error::msg(format!("error reading file at '{}': {}", path.display(), e))
            })?;

            Ok(tera::Value::String(content))
        }

        fn is_safe(&self) -> bool {
            true
        }
    }

}
