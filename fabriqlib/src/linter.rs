//! Content linter run over every parsed post before rendering.
//!
//! Rules are identified by an `E`-code and carry a default level which
//! `site.yaml` can override per rule, optionally scoped to a permalink
//! glob. Any triggered `DENY` rule aborts the build.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use eyre::eyre;
use tracing::trace;

use crate::core::config::LinterConfig;
use crate::core::library::Library;
use crate::core::post::Post;
use crate::util::{Glob, GlobCandidate};
use crate::Result;

pub const LINT_LEVEL_ALLOW: &str = "ALLOW";
pub const LINT_LEVEL_WARN: &str = "WARN";
pub const LINT_LEVEL_DENY: &str = "DENY";

const MAX_TITLE_CHARS: usize = 80;
const MIN_DESCRIPTION_CHARS: usize = 10;
const MAX_DESCRIPTION_CHARS: usize = 300;
const MIN_CONTENT_WORDS: usize = 50;

#[derive(Clone, Debug, Copy, Eq, PartialEq)]
pub enum LintLevel {
    Allow,
    Warn,
    Deny,
}

impl FromStr for LintLevel {
    type Err = eyre::Report;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            LINT_LEVEL_ALLOW => Ok(Self::Allow),
            LINT_LEVEL_WARN => Ok(Self::Warn),
            LINT_LEVEL_DENY => Ok(Self::Deny),
            other => Err(eyre!("invalid lint level {}", other)),
        }
    }
}

impl std::fmt::Display for LintLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self {
            Self::Allow => LINT_LEVEL_ALLOW,
            Self::Warn => LINT_LEVEL_WARN,
            Self::Deny => LINT_LEVEL_DENY,
        };
        write!(f, "{level}")
    }
}

/// Restricts a rule to posts whose permalink matches one of the globs.
#[derive(Debug, Clone)]
pub enum Matcher {
    Glob(Vec<Glob>),
}

impl Matcher {
    pub fn is_match<S: AsRef<str>>(&self, search: S) -> bool {
        match self {
            Matcher::Glob(globs) => {
                let candidate = GlobCandidate::new(search.as_ref());
                globs.iter().any(|g| g.is_match_candidate(&candidate))
            }
        }
    }
}

/// Site-wide facts a rule may need beyond the post itself.
#[derive(Debug, Default)]
pub struct LintContext {
    permalink_counts: HashMap<String, usize>,
    template_names: HashSet<String>,
    now_ts: i64,
}

impl LintContext {
    pub fn new<I, S>(library: &Library, template_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut permalink_counts: HashMap<String, usize> = HashMap::new();
        for (_, post) in library {
            *permalink_counts.entry(post.permalink()).or_default() += 1;
        }
        Self {
            permalink_counts,
            template_names: template_names.into_iter().map(Into::into).collect(),
            now_ts: chrono::Utc::now().timestamp(),
        }
    }
}

type CheckFn = fn(&Post, &LintContext) -> bool;

/// A single built-in rule. The check returns `true` when the rule triggers.
#[derive(Clone, Debug)]
pub struct LintRule {
    pub code: &'static str,
    pub default_level: LintLevel,
    pub msg: &'static str,
    check: CheckFn,
}

pub const RULES: &[LintRule] = &[
    LintRule {
        code: "E100",
        default_level: LintLevel::Deny,
        msg: "missing title",
        check: |post, _| post.frontmatter.title.as_deref().map_or(true, str::is_empty),
    },
    LintRule {
        code: "E101",
        default_level: LintLevel::Warn,
        msg: "title is too long",
        check: |post, _| {
            post.frontmatter
                .title
                .as_deref()
                .map_or(false, |t| t.chars().count() > MAX_TITLE_CHARS)
        },
    },
    LintRule {
        code: "E110",
        default_level: LintLevel::Warn,
        msg: "missing author",
        check: |post, _| {
            post.frontmatter
                .author
                .as_deref()
                .map_or(true, str::is_empty)
        },
    },
    LintRule {
        code: "E120",
        default_level: LintLevel::Warn,
        msg: "missing category",
        check: |post, _| {
            post.frontmatter
                .category
                .as_deref()
                .map_or(true, str::is_empty)
        },
    },
    LintRule {
        code: "E121",
        default_level: LintLevel::Warn,
        msg: "post has no tags",
        check: |post, _| post.frontmatter.tags.is_empty(),
    },
    LintRule {
        code: "E130",
        default_level: LintLevel::Warn,
        msg: "description missing or outside length bounds",
        check: |post, _| {
            post.frontmatter.description.as_deref().map_or(true, |d| {
                let chars = d.chars().count();
                !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&chars)
            })
        },
    },
    LintRule {
        code: "E140",
        default_level: LintLevel::Warn,
        msg: "content is too short",
        check: |post, _| post.stats.num_words < MIN_CONTENT_WORDS,
    },
    LintRule {
        code: "E150",
        default_level: LintLevel::Deny,
        msg: "duplicate permalink",
        check: |post, ctx| {
            ctx.permalink_counts
                .get(&post.permalink())
                .map_or(false, |count| *count > 1)
        },
    },
    LintRule {
        code: "E151",
        default_level: LintLevel::Warn,
        msg: "creation date is in the future",
        check: |post, ctx| {
            post.frontmatter
                .creation_ts()
                .map_or(false, |ts| ts > ctx.now_ts)
        },
    },
    LintRule {
        code: "E152",
        default_level: LintLevel::Deny,
        msg: "unparseable date",
        check: |post, _| {
            let bad = |raw: &Option<String>| {
                raw.as_deref()
                    .map_or(false, |d| crate::core::post::frontmatter::parse_date(d).is_none())
            };
            bad(&post.frontmatter.creation_date) || bad(&post.frontmatter.update_date)
        },
    },
    LintRule {
        code: "E160",
        default_level: LintLevel::Warn,
        msg: "image missing alt text",
        check: |post, _| post.stats.num_images_missing_alt > 0,
    },
    LintRule {
        code: "E170",
        default_level: LintLevel::Deny,
        msg: "unknown template",
        check: |post, ctx| !ctx.template_names.contains(post.template_name().as_str()),
    },
];

#[derive(Debug, Clone)]
struct ConfiguredRule {
    rule: LintRule,
    level: LintLevel,
    scope: Option<Matcher>,
}

/// The rule set with `site.yaml` overrides applied.
#[derive(Debug, Clone)]
pub struct Linter {
    rules: Vec<ConfiguredRule>,
}

impl Linter {
    pub fn new(config: &LinterConfig) -> Result<Self> {
        let mut rules = vec![];
        for rule in RULES {
            let mut level = rule.default_level;
            let mut scope = None;
            if let Some(overrides) = config.rules.get(rule.code) {
                if let Some(raw) = &overrides.level {
                    level = LintLevel::from_str(raw)
                        .map_err(|e| eyre!("bad level for lint rule {}: {}", rule.code, e))?;
                }
                if let Some(glob) = &overrides.scope {
                    let glob = Glob::try_from(glob.as_str())
                        .map_err(|e| eyre!("bad scope glob for lint rule {}: {}", rule.code, e))?;
                    scope = Some(Matcher::Glob(vec![glob]));
                }
            }
            rules.push(ConfiguredRule {
                rule: rule.clone(),
                level,
                scope,
            });
        }
        Ok(Self { rules })
    }

    pub fn lint(&self, ctx: &LintContext, post: &Post) -> LintResults {
        trace!(post = %post.rel_path().display(), "linting post");
        let permalink = post.permalink();

        let results = self
            .rules
            .iter()
            .filter(|configured| configured.level != LintLevel::Allow)
            .filter(|configured| {
                configured
                    .scope
                    .as_ref()
                    .map_or(true, |matcher| matcher.is_match(&permalink))
            })
            .filter(|configured| (configured.rule.check)(post, ctx))
            .map(|configured| LintResult::new(configured.rule.code, configured.level, configured.rule.msg, post));
        LintResults::from_iter(results)
    }
}

#[derive(Clone, Debug)]
pub struct LintResult {
    pub code: String,
    pub level: LintLevel,
    pub msg: String,
    pub rel_path: std::path::PathBuf,
}

impl LintResult {
    pub fn new<C: Into<String>, S: Into<String>>(
        code: C,
        level: LintLevel,
        msg: S,
        post: &Post,
    ) -> Self {
        Self {
            code: code.into(),
            level,
            msg: msg.into(),
            rel_path: post.rel_path().to_path_buf(),
        }
    }
}

impl std::fmt::Display for LintResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.level,
            self.code,
            self.msg,
            self.rel_path.display()
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct LintResults {
    inner: Vec<LintResult>,
}

impl LintResults {
    pub fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn from_slice(lints: &[LintResult]) -> Self {
        Self {
            inner: lints.into(),
        }
    }

    pub fn from_iter<L: Iterator<Item = LintResult>>(lints: L) -> Self {
        Self {
            inner: lints.collect(),
        }
    }

    pub fn extend(&mut self, other: LintResults) {
        self.inner.extend(other.inner);
    }

    pub fn has_deny(&self) -> bool {
        self.inner.iter().any(|lint| lint.level == LintLevel::Deny)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LintResult> {
        self.inner.iter()
    }
}

impl IntoIterator for LintResults {
    type Item = LintResult;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a> IntoIterator for &'a LintResults {
    type Item = &'a LintResult;
    type IntoIter = std::slice::Iter<'a, LintResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl std::fmt::Display for LintResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msgs = self
            .inner
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        write!(f, "{msgs}")
    }
}
