pub mod syntect_highlighter;

pub use syntect_highlighter::SyntectHighlighter;
