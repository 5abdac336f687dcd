use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::config::ParserConfig;
use crate::discover::{self, UrlType};
use crate::render::highlight::SyntectHighlighter;
use crate::util::slugify;
use crate::Result;

/// Extra weight given to a line of code when estimating read time.
const CODE_LINE_WORD_WEIGHT: usize = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub title: String,
    pub anchor: String,
}

/// Table of contents recorded while rendering, in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Toc(Vec<TocEntry>);

impl Toc {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn push(&mut self, entry: TocEntry) {
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostStats {
    pub num_words: usize,
    pub num_code_blocks: usize,
    pub num_code_lines: usize,
    pub num_images: usize,
    pub num_images_missing_alt: usize,
    pub num_internal_links: usize,
    pub num_external_links: usize,
    /// Estimated read time in whole minutes, never zero for non-empty content.
    pub read_time_minutes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedMarkdown {
    pub html: String,
    pub toc: Toc,
    pub stats: PostStats,
}

#[derive(Debug)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::unused_self)]
    pub fn render<S: AsRef<str>>(
        &self,
        raw_markdown: S,
        highlighter: &SyntectHighlighter,
        config: &ParserConfig,
    ) -> Result<RenderedMarkdown> {
        render(raw_markdown.as_ref(), highlighter, config)
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn render(
    raw_markdown: &str,
    highlighter: &SyntectHighlighter,
    config: &ParserConfig,
) -> Result<RenderedMarkdown> {
    use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag};

    let options = Options::all();
    let parser = Parser::new_ext(raw_markdown, options);

    let mut events = vec![];
    let mut toc = Toc::new();
    let mut stats = PostStats::default();

    // tracks used heading anchors so duplicates get a numeric suffix
    let mut anchors: HashMap<String, usize> = HashMap::new();

    let mut code_block_lang: Option<String> = None;
    let mut heading: Option<(u8, String)> = None;
    let mut image_alt_words: Option<usize> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading(level, _, _)) => {
                heading = Some((level as u8, String::new()));
            }
            Event::End(Tag::Heading(..)) => {
                if let Some((level, title)) = heading.take() {
                    let title = title.trim().to_string();
                    let anchor = unique_anchor(&mut anchors, &title);
                    events.push(Event::Html(
                        format!(
                            "<h{level} id=\"{anchor}\">{title}</h{level}>",
                            title = escaped(&title)
                        )
                        .into(),
                    ));
                    toc.push(TocEntry {
                        level,
                        title,
                        anchor,
                    });
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                stats.num_code_blocks += 1;
                let lang = match kind {
                    CodeBlockKind::Indented => String::new(),
                    CodeBlockKind::Fenced(name) => name.to_string(),
                };
                events.push(Event::Html(code_block_open(&lang).into()));
                code_block_lang = Some(lang);
            }
            Event::End(Tag::CodeBlock(_)) => {
                code_block_lang = None;
                events.push(Event::Html("</code></pre>".into()));
            }
            Event::Start(Tag::Image(ty, src, title)) => {
                stats.num_images += 1;
                image_alt_words = Some(0);
                if heading.is_none() {
                    events.push(Event::Start(Tag::Image(ty, src, title)));
                }
            }
            Event::End(Tag::Image(ty, src, title)) => {
                if image_alt_words.take() == Some(0) {
                    stats.num_images_missing_alt += 1;
                }
                if heading.is_none() {
                    events.push(Event::End(Tag::Image(ty, src, title)));
                }
            }
            Event::Start(Tag::Link(ty, href, title)) => {
                match discover::get_url_type(&href) {
                    UrlType::Offsite => stats.num_external_links += 1,
                    UrlType::Absolute | UrlType::Relative(_) => stats.num_internal_links += 1,
                }
                if heading.is_none() {
                    events.push(Event::Start(Tag::Link(ty, href, title)));
                }
            }
            Event::Text(content) => {
                if let Some(lang) = code_block_lang.as_deref() {
                    stats.num_code_lines += content.lines().count();
                    let rendered = render_code_block(lang, &content, highlighter, config);
                    events.push(Event::Html(rendered.into()));
                } else if let Some((_, title)) = heading.as_mut() {
                    let word_count = content.split_whitespace().count();
                    stats.num_words += word_count;
                    if let Some(words) = image_alt_words.as_mut() {
                        *words += word_count;
                    }
                    title.push_str(&content);
                } else if let Some(words) = image_alt_words.as_mut() {
                    *words += content.split_whitespace().count();
                    events.push(Event::Text(content));
                } else {
                    stats.num_words += content.split_whitespace().count();
                    events.push(Event::Text(content));
                }
            }
            Event::Code(content) => {
                if let Some((_, title)) = heading.as_mut() {
                    title.push_str(&content);
                } else {
                    events.push(Event::Code(content));
                }
            }
            Event::SoftBreak | Event::HardBreak if heading.is_some() => {
                if let Some((_, title)) = heading.as_mut() {
                    title.push(' ');
                }
            }
            // markup nested inside a heading contributes only to the title text
            other => match other {
                Event::Start(_) | Event::End(_) if heading.is_some() => {}
                other => events.push(other),
            },
        }
    }

    stats.read_time_minutes = estimate_read_time(&stats, config.min_read_speed);

    let mut buf = String::new();
    html::push_html(&mut buf, events.into_iter());

    Ok(RenderedMarkdown {
        html: buf,
        toc,
        stats,
    })
}

fn code_block_open(lang: &str) -> String {
    if lang.is_empty() {
        String::from("<pre><code>")
    } else {
        format!("<pre><code class=\"language-{}\">", escaped(lang))
    }
}

fn render_code_block(
    lang: &str,
    content: &str,
    highlighter: &SyntectHighlighter,
    config: &ParserConfig,
) -> String {
    if config.code_highlighting && !lang.is_empty() {
        if let Some(syntax) = highlighter.get_syntax_by_token(lang) {
            return highlighter.highlight(syntax, content).join("");
        }
    }
    escaped(content)
}

fn unique_anchor(anchors: &mut HashMap<String, usize>, title: &str) -> String {
    let base = {
        let slug = slugify(title);
        if slug.is_empty() {
            String::from("section")
        } else {
            slug
        }
    };
    let seen = anchors.entry(base.clone()).or_insert(0);
    *seen += 1;
    if *seen == 1 {
        base
    } else {
        format!("{}-{}", base, *seen - 1)
    }
}

fn escaped(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let _ = pulldown_cmark::escape::escape_html(&mut buf, raw);
    buf
}

fn estimate_read_time(stats: &PostStats, words_per_minute: u32) -> usize {
    let effective_words = stats.num_words + stats.num_code_lines * CODE_LINE_WORD_WEIGHT;
    if effective_words == 0 {
        return 0;
    }
    let wpm = words_per_minute.max(1) as usize;
    (effective_words + wpm - 1) / wpm
}
