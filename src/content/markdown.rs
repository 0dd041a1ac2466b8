//! Markdown rendering with syntax highlighting

use anyhow::Result;
use lazy_static::lazy_static;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;
use crate::helpers::html_escape;

lazy_static! {
    /// `<!--more-->`, with any whitespace inside the comment
    static ref MORE_MARKER: Regex = Regex::new(r"<!--\s*more\s*-->").unwrap();
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    highlight: bool,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::with_options(&HighlightConfig::default())
    }

    /// Create with custom settings
    pub fn with_options(config: &HighlightConfig) -> Self {
        let theme_set = ThemeSet::load_defaults();
        if config.enable && !theme_set.themes.contains_key(&config.theme) {
            tracing::warn!(
                "Unknown highlight theme `{}`, falling back to the first bundled theme",
                config.theme
            );
        }
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set,
            theme_name: config.theme.clone(),
            highlight: config.enable,
            line_numbers: config.line_numbers,
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> Result<String> {
        let parser = Parser::new_ext(markdown, markdown_options());

        let mut events: Vec<Event> = Vec::new();
        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(|lang| lang.to_string()),
                        CodeBlockKind::Indented => None,
                    };
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    let block = self.code_block(&code_block_content, code_block_lang.as_deref());
                    events.push(Event::Html(CowStr::from(block)));
                    in_code_block = false;
                    code_block_lang = None;
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                _ => events.push(event),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(html_output)
    }

    /// Render one fenced or indented code block
    fn code_block(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        if !self.highlight {
            return format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                html_escape(lang),
                html_escape(code)
            );
        }

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.values().next());

        let highlighted = theme.and_then(|theme| {
            highlighted_html_for_string(code, &self.syntax_set, syntax, theme).ok()
        });

        match highlighted {
            Some(highlighted) if self.line_numbers => self.add_line_numbers(&highlighted, lang),
            Some(highlighted) => highlighted,
            None => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                html_escape(lang),
                html_escape(code)
            ),
        }
    }

    /// Add line numbers to highlighted code
    fn add_line_numbers(&self, code: &str, lang: &str) -> String {
        let line_count = code.lines().count();
        let gutter = (1..=line_count)
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
            html_escape(lang),
            gutter,
            code
        )
    }

    /// Split a post body at the first `<!--more-->` marker.
    ///
    /// Returns the Markdown before the marker (if there is one) and the body
    /// with the marker removed.
    ///
    /// Only a marker written as HTML counts; one inside a code block or
    /// code span is left alone.
    pub fn split_summary(content: &str) -> (Option<String>, String) {
        match find_more_marker(content) {
            Some((start, end)) => {
                let summary = content[..start].trim().to_string();
                let rest = content[end..].trim();
                let full = format!("{}\n\n{}", summary, rest);
                (Some(summary), full)
            }
            None => (None, content.to_string()),
        }
    }
}

/// Front matter is stripped before rendering, so no metadata-block option
fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Byte range of the first `<!--more-->` that Markdown parses as raw HTML
fn find_more_marker(content: &str) -> Option<(usize, usize)> {
    let mut in_code_block = false;

    for (event, range) in Parser::new_ext(content, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Html(_) | Event::InlineHtml(_) if !in_code_block => {
                if let Some(m) = MORE_MARKER.find(&content[range.clone()]) {
                    return Some((range.start + m.start(), range.start + m.end()));
                }
            }
            _ => {}
        }
    }
    None
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.").unwrap();
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_code_block_highlighted() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```").unwrap();
        assert!(html.contains("<pre"));
        assert!(html.contains("style="));
        assert!(!html.contains("```"));
    }

    #[test]
    fn test_render_code_block_plain() {
        let renderer = MarkdownRenderer::with_options(&HighlightConfig {
            enable: false,
            ..Default::default()
        });
        let html = renderer
            .render("Before\n\n```elixir\nOban.insert(<job>)\n```\n\nAfter")
            .unwrap();
        assert!(html.contains(r#"<code class="language-elixir">Oban.insert(&lt;job&gt;)"#));
        assert!(html.contains("<p>After</p>"));
    }

    #[test]
    fn test_line_numbers() {
        let renderer = MarkdownRenderer::with_options(&HighlightConfig {
            line_numbers: true,
            ..Default::default()
        });
        let html = renderer.render("```js\nlet a = 1;\nlet b = 2;\n```").unwrap();
        assert!(html.contains(r#"<span class="line-number">2</span>"#));
    }

    #[test]
    fn test_split_summary() {
        let content = "This is the summary.\n<!--more-->\nThis is more content.";
        let (summary, full) = MarkdownRenderer::split_summary(content);
        assert_eq!(summary, Some("This is the summary.".to_string()));
        assert!(full.contains("This is the summary."));
        assert!(full.contains("This is more content."));
        assert!(!full.contains("more-->"));
    }

    #[test]
    fn test_split_summary_spaced_marker() {
        let (summary, _) = MarkdownRenderer::split_summary("Intro\n\n<!-- more -->\n\nRest");
        assert_eq!(summary.as_deref(), Some("Intro"));
    }

    #[test]
    fn test_split_summary_ignores_marker_in_code() {
        let content = "How to fold a post:\n\n```markdown\nIntro\n<!--more-->\nRest\n```\n\nInline `<!--more-->` too.\n";
        let (summary, full) = MarkdownRenderer::split_summary(content);
        assert!(summary.is_none());
        assert_eq!(full, content);

        let renderer = MarkdownRenderer::with_options(&HighlightConfig {
            enable: false,
            ..Default::default()
        });
        let html = renderer.render(&full).unwrap();
        assert!(html.contains("Intro\n&lt;!--more--&gt;\nRest"));
        assert!(html.contains("<code>&lt;!--more--&gt;</code>"));
    }

    #[test]
    fn test_split_summary_marker_after_code() {
        let content = "```\n<!--more-->\n```\n\nLead.\n\n<!--more-->\n\nTail.";
        let (summary, full) = MarkdownRenderer::split_summary(content);
        let summary = summary.unwrap();
        assert!(summary.contains("```\n<!--more-->\n```"));
        assert!(summary.ends_with("Lead."));
        assert!(full.ends_with("Tail."));
        assert_eq!(full.matches("<!--more-->").count(), 1);
    }

    #[test]
    fn test_split_summary_without_marker() {
        let (summary, full) = MarkdownRenderer::split_summary("No marker here.");
        assert!(summary.is_none());
        assert_eq!(full, "No marker here.");
    }
}
