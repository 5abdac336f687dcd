use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::collections::SortOrder;
use crate::Result;

/// Site configuration loaded from `site.yaml` at the project root.
///
/// Every section carries defaults so a minimal (or empty) config file
/// still produces a working site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site: SiteInfo,
    pub dirs: DirConfig,
    pub threads: usize,
    pub parser: ParserConfig,
    pub collections: CollectionConfig,
    pub plugins: PluginConfig,
    pub linter: LinterConfig,
}

impl SiteConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed reading site config at '{}'", path.display()))?;
        Self::from_yaml(&raw)
            .wrap_err_with(|| format!("failed parsing site config at '{}'", path.display()))
    }

    pub fn from_yaml<S: AsRef<str>>(raw: S) -> Result<Self> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).wrap_err("malformed site config YAML")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteInfo {
    pub title: String,
    pub url: String,
    pub author: String,
    pub description: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: String::new(),
            url: String::new(),
            author: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirConfig {
    pub content: PathBuf,
    pub templates: PathBuf,
    pub output: PathBuf,
    pub logs: PathBuf,
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            content: PathBuf::from("content"),
            templates: PathBuf::from("templates"),
            output: PathBuf::from("public"),
            logs: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Highlight fenced code blocks with syntect CSS classes.
    pub code_highlighting: bool,
    /// Theme name used by the `themes` CSS generator.
    pub code_highlighting_theme: String,
    /// Words per minute used for the read-time estimate.
    pub min_read_speed: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            code_highlighting: true,
            code_highlighting_theme: String::from("InspiredGitHub"),
            min_read_speed: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Tag/category groups smaller than this are not rendered as index pages.
    pub min_posts: usize,
    pub tag_template: String,
    pub category_template: String,
    pub tag_output_dir: PathBuf,
    pub category_output_dir: PathBuf,
    pub sort_order: SortOrder,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            min_posts: 1,
            tag_template: String::from("tag.html"),
            category_template: String::from("category.html"),
            tag_output_dir: PathBuf::from("tags"),
            category_output_dir: PathBuf::from("categories"),
            sort_order: SortOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directory holding `*.rhai` plugin scripts, relative to the
    /// project root.
    pub dir: PathBuf,
    /// Plugins run in this order. Scripts present in the plugin
    /// directory but not listed here are ignored.
    pub enabled: Vec<String>,
    /// Free-form per-plugin settings, pushed into each script's scope.
    pub settings: HashMap<String, serde_json::Value>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("plugins"),
            enabled: vec![],
            settings: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinterConfig {
    /// Per-rule overrides keyed by rule code (e.g. `E110`).
    pub rules: HashMap<String, LintRuleOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LintRuleOverride {
    /// `ALLOW`, `WARN`, or `DENY`.
    pub level: Option<String>,
    /// Restrict the rule to permalinks matching this glob.
    pub scope: Option<String>,
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SiteConfig::from_yaml("").unwrap();
        assert_eq!(config.dirs.content, PathBuf::from("content"));
        assert_eq!(config.dirs.output, PathBuf::from("public"));
        assert_eq!(config.collections.min_posts, 1);
        assert_eq!(config.parser.min_read_speed, 250);
        assert!(config.parser.code_highlighting);
    }

    #[test]
    fn parses_partial_config() {
        let raw = r#"
site:
  title: demo site
dirs:
  output: dist
collections:
  min_posts: 3
"#;
        let config = SiteConfig::from_yaml(raw).unwrap();
        assert_eq!(config.site.title, "demo site");
        assert_eq!(config.dirs.output, PathBuf::from("dist"));
        assert_eq!(config.dirs.content, PathBuf::from("content"));
        assert_eq!(config.collections.min_posts, 3);
    }

    #[test]
    fn parses_plugin_section() {
        let raw = r#"
plugins:
  dir: extensions
  enabled:
    - read_time
    - sitemap
  settings:
    sitemap:
      filename: sitemap.xml
"#;
        let config = SiteConfig::from_yaml(raw).unwrap();
        assert_eq!(config.plugins.dir, PathBuf::from("extensions"));
        assert_eq!(config.plugins.enabled, vec!["read_time", "sitemap"]);
        assert_eq!(
            config.plugins.settings["sitemap"]["filename"],
            serde_json::json!("sitemap.xml")
        );
    }

    #[test]
    fn plugin_dir_defaults_to_plugins() {
        let config = SiteConfig::from_yaml("").unwrap();
        assert_eq!(config.plugins.dir, PathBuf::from("plugins"));
    }

    #[test]
    fn parses_collection_sort_order() {
        let raw = "collections:\n  sort_order: creation_asc\n";
        let config = SiteConfig::from_yaml(raw).unwrap();
        assert_eq!(config.collections.sort_order, SortOrder::CreationAsc);
        assert_eq!(
            SiteConfig::default().collections.sort_order,
            SortOrder::CreationDesc
        );
    }

    #[test]
    fn parses_linter_overrides() {
        let raw = r#"
linter:
  rules:
    E110:
      level: DENY
    E121:
      level: ALLOW
      scope: "/drafts/**"
"#;
        let config = SiteConfig::from_yaml(raw).unwrap();
        assert_eq!(config.linter.rules["E110"].level.as_deref(), Some("DENY"));
        assert_eq!(
            config.linter.rules["E121"].scope.as_deref(),
            Some("/drafts/**")
        );
    }

    #[test]
    fn rejects_malformed_yaml() {
        let config = SiteConfig::from_yaml("dirs: [not, a, map]");
        assert!(config.is_err());
    }

    #[test]
    fn reads_from_file() {
        let tree = temptree::temptree! {
            "site.yaml": "site:\n  title: from file\n",
        };
        let config = SiteConfig::from_file(tree.path().join("site.yaml")).unwrap();
        assert_eq!(config.site.title, "from file");
    }

    #[test]
    fn missing_file_is_an_error() {
        let tree = temptree::temptree! {};
        assert!(SiteConfig::from_file(tree.path().join("nope.yaml")).is_err());
    }
}
