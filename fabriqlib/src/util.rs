use eyre::WrapErr;
use std::path::Path;
use tracing::{instrument, trace};

use crate::Result;

#[macro_export]
macro_rules! static_regex {
    ($re:literal $(,)?) => {{
        static RE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
        RE.get_or_init(|| {
            regex::Regex::new($re).expect(&format!("Malformed regex '{}'. This is a bug.", $re))
        })
    }};
}

pub(crate) use static_regex;

#[instrument]
pub fn make_parent_dirs(dir: &Path) -> Result<()> {
    trace!("create parent directories");
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create parent directories at '{}'", dir.display()))
}

/// Reduces arbitrary text to a URL-safe identifier: lowercased ASCII
/// alphanumerics with runs of anything else collapsed into single hyphens.
pub fn slugify<S: AsRef<str>>(text: S) -> String {
    let mut slug = String::with_capacity(text.as_ref().len());
    let mut prev_hyphen = true;
    for ch in text.as_ref().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug)]
pub struct GlobCandidate<'a>(globset::Candidate<'a>);

impl<'a> GlobCandidate<'a> {
    pub fn new<P: AsRef<Path> + ?Sized>(path: &'a P) -> GlobCandidate<'a> {
        Self(globset::Candidate::new(path))
    }
}

#[derive(Debug, Clone)]
pub struct Glob {
    glob: globset::Glob,
    matcher: globset::GlobMatcher,
}

impl Glob {
    pub fn is_match<P: AsRef<Path>>(&self, path: P) -> bool {
        self.matcher.is_match(path)
    }

    pub fn is_match_candidate(&self, path: &GlobCandidate<'_>) -> bool {
        self.matcher.is_match_candidate(&path.0)
    }

    pub fn glob(&self) -> &str {
        self.glob.glob()
    }
}

impl TryFrom<String> for Glob {
    type Error = globset::Error;

    fn try_from(s: String) -> std::result::Result<Glob, Self::Error> {
        s.as_str().try_into()
    }
}

impl TryFrom<&str> for Glob {
    type Error = globset::Error;

    fn try_from(s: &str) -> std::result::Result<Glob, Self::Error> {
        let glob = globset::GlobBuilder::new(s)
            .literal_separator(true)
            .build()?;
        let matcher = glob.compile_matcher();
        Ok(Self { glob, matcher })
    }
}

#[cfg(test)]
mod test {
    #![allow(warnings, unused)]

    use super::*;

    #[test]
    fn glob_try_from_str_and_string() {
        assert!(Glob::try_from("/*.*").is_ok());
        assert!(Glob::try_from("/*.*".to_owned()).is_ok());
    }

    #[test]
    fn glob_is_match() {
        let glob = Glob::try_from("*.md").unwrap();
        assert_eq!(glob.is_match("post.md"), true);
        assert_eq!(glob.is_match("post.html"), false);
    }

    #[test]
    fn glob_is_match_candidate() {
        let glob = Glob::try_from("*.md").unwrap();

        let candidate_ok = GlobCandidate::new("post.md");
        let candidate_err = GlobCandidate::new("post.html");

        assert_eq!(glob.is_match_candidate(&candidate_ok), true);
        assert_eq!(glob.is_match_candidate(&candidate_err), false);
    }

    #[test]
    fn glob_get_as_str() {
        let glob = Glob::try_from("*.md").unwrap();
        assert_eq!(glob.glob(), "*.md");
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Machine Learning"), "machine-learning");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("C++ & Rust: a tale"), "c-rust-a-tale");
    }

    #[test]
    fn slugify_trims_hyphens() {
        assert_eq!(slugify("  spaced out  "), "spaced-out");
    }

    #[test]
    fn slugify_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn makes_parent_dirs() {
        let tree = temptree::temptree! {
            a: {},
        };
        let target = tree.path().join("a/b/c");
        make_parent_dirs(&target).unwrap();
        assert!(target.exists());
    }
}
