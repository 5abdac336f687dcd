pub mod markdown;

pub use markdown::{MarkdownRenderer, PostStats, RenderedMarkdown, Toc, TocEntry};
