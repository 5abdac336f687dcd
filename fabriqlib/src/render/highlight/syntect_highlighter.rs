use eyre::eyre;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::css_for_theme_with_class_style;
use syntect::html::{line_tokens_to_classed_spans, ClassStyle};
use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::Result;

pub const THEME_CLASS_PREFIX: &str = "syn-";
const THEME_CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed {
    prefix: THEME_CLASS_PREFIX,
};

#[derive(Debug, Clone)]
pub struct CssTheme {
    name: String,
    css: String,
}

impl CssTheme {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn css(&self) -> &str {
        self.css.as_str()
    }
}

/// Code-block highlighter producing CSS-classed spans. The actual colors
/// come from a stylesheet generated with [`SyntectHighlighter::generate_css_theme`].
#[derive(Debug)]
pub struct SyntectHighlighter {
    theme_set: ThemeSet,
    syntax_set: SyntaxSet,
}

impl SyntectHighlighter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            theme_set: ThemeSet::load_defaults(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
        })
    }

    pub fn syntaxes(&self) -> &[SyntaxReference] {
        self.syntax_set.syntaxes()
    }

    pub fn get_syntax_by_token<S: AsRef<str>>(&self, token: S) -> Option<&SyntaxReference> {
        self.syntax_set.find_syntax_by_token(token.as_ref())
    }

    pub fn get_theme<S: AsRef<str>>(&self, name: S) -> Option<&Theme> {
        self.theme_set.themes.get(name.as_ref())
    }

    pub fn theme_names(&self) -> impl Iterator<Item = &str> {
        self.theme_set.themes.keys().map(String::as_str)
    }

    pub fn generate_css_theme<S: AsRef<str>>(&self, name: S) -> Result<CssTheme> {
        let name = name.as_ref();
        let theme = self
            .get_theme(name)
            .ok_or_else(|| eyre!("no syntax theme named '{}'", name))?;
        Ok(CssTheme {
            name: name.to_string(),
            css: css_for_theme_with_class_style(theme, THEME_CLASS_STYLE)
                .map_err(|e| eyre!("failed generating CSS for theme '{}': {}", name, e))?,
        })
    }

    pub fn highlight<S: AsRef<str>>(&self, syntax: &SyntaxReference, code: S) -> Vec<String> {
        let mut highlighter = ClassHighlighter::new(syntax, &self.syntax_set);

        let mut lines: Vec<String> = LinesWithEndings::from(code.as_ref())
            .map(|line| highlighter.highlight_line(line))
            .collect();
        let closer = highlighter.finalize();
        if !closer.is_empty() {
            lines.push(closer);
        }
        lines
    }
}

// Highlighter taken from Zola https://github.com/getzola/zola/blob/master/components/rendering/src/codeblock/highlight.rs#L21
#[derive(Debug)]
pub struct ClassHighlighter<'s> {
    syntax_set: &'s SyntaxSet,
    open_spans: isize,
    parse_state: ParseState,
    scope_stack: ScopeStack,
}

impl<'s> ClassHighlighter<'s> {
    pub fn new(syntax: &SyntaxReference, syntax_set: &'s SyntaxSet) -> Self {
        let parse_state = ParseState::new(syntax);
        Self {
            syntax_set,
            open_spans: 0,
            parse_state,
            scope_stack: ScopeStack::new(),
        }
    }

    /// Parse the line of code and update the internal HTML buffer with tagged HTML
    ///
    /// *Note:* This function requires `line` to include a newline at the end and
    /// also use of the `load_defaults_newlines` version of the syntaxes.
    pub fn highlight_line(&mut self, line: &str) -> String {
        debug_assert!(line.ends_with('\n'));
        let parsed_line = self
            .parse_state
            .parse_line(line, self.syntax_set)
            .unwrap_or_default();
        let (formatted_line, delta) = line_tokens_to_classed_spans(
            line,
            parsed_line.as_slice(),
            THEME_CLASS_STYLE,
            &mut self.scope_stack,
        )
        .unwrap_or_default();
        self.open_spans += delta;
        formatted_line
    }

    /// Close all open `<span>` tags and return the finished HTML string
    pub fn finalize(&mut self) -> String {
        let mut html = String::with_capacity((self.open_spans * 7).max(0) as usize);
        for _ in 0..self.open_spans {
            html.push_str("</span>");
        }
        html
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creates_new_highlighter() {
        let highlighter = SyntectHighlighter::new().expect("failed to create syntect highlighter");
        assert!(!highlighter.theme_set.themes.is_empty());
    }

    #[test]
    fn gets_syntaxes() {
        let highlighter = SyntectHighlighter::new().unwrap();
        assert!(!highlighter.syntaxes().is_empty());
    }

    #[test]
    fn gets_syntax_by_token() {
        let highlighter = SyntectHighlighter::new().unwrap();
        assert!(highlighter.get_syntax_by_token("rs").is_some());
    }

    #[test]
    fn doesnt_find_nonexistent_syntax() {
        let highlighter = SyntectHighlighter::new().unwrap();
        assert!(highlighter.get_syntax_by_token("NOT_A_SYNTAX").is_none());
    }

    #[test]
    fn generates_css_theme() {
        let highlighter = SyntectHighlighter::new().unwrap();
        let theme = highlighter
            .generate_css_theme("InspiredGitHub")
            .expect("failed to generate theme");
        assert_eq!(theme.name(), "InspiredGitHub");
        assert!(theme.css().contains(THEME_CLASS_PREFIX));
    }

    #[test]
    fn unknown_theme_is_an_error() {
        let highlighter = SyntectHighlighter::new().unwrap();
        assert!(highlighter.generate_css_theme("NOT_A_THEME").is_err());
    }

    #[test]
    fn highlights_rust_line() {
        let highlighter = SyntectHighlighter::new().unwrap();
        let syntax = highlighter.get_syntax_by_token("rust").unwrap();
        let lines = highlighter.highlight(syntax, "let x = 1;\n");
        let html = lines.join("");
        assert!(html.contains("<span"));
        assert_eq!(
            html.matches("<span").count(),
            html.matches("</span>").count()
        );
    }
}
