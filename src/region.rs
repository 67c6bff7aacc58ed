//! Region buffers – the header, body and footer payloads of a document and
//! their serialization into standalone HTML files for the converter.
//!
//! A rendered region is a complete HTML page:
//!
//! ```text
//! <!DOCTYPE html><html><head><meta charset="utf-8">
//!   <style>region css | default stylesheet</style>
//!   <link rel="stylesheet" ...>   (one per css file, insertion order)
//! </head><body>content [widgets]</body></html>
//! ```
//!
//! The footer can also be rendered as a bare fragment. Every rendering passes
//! through [`parse_relative_links`] so `/media/cache/` references resolve
//! when the converter loads the file from disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{Error, Result};

/// Stylesheet used when a region has no CSS of its own.
pub const DEFAULT_CSS: &str = include_str!("default/body.css");

/// Site-relative prefix rewritten by [`parse_relative_links`].
pub const MEDIA_CACHE_PREFIX: &str = "/media/cache/";

/// Which part of the page a region fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Header,
    Body,
    Footer,
}

impl RegionKind {
    /// File-name stem of the region's temporary HTML file.
    pub fn file_stem(self) -> &'static str {
        match self {
            RegionKind::Header => "header",
            RegionKind::Body => "body",
            RegionKind::Footer => "footer",
        }
    }
}

/// How the footer is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FooterMode {
    /// Standalone page loaded by the converter once per PDF page.
    #[default]
    FullPage,
    /// `<div>` fragment for embedding into another document.
    Fragment,
}

/// One document region: raw HTML content plus its styling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    css: String,
    css_files: Vec<PathBuf>,
    content: String,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the HTML content.
    pub fn set_content(&mut self, html: impl Into<String>) {
        self.content = html.into();
    }

    /// Replace the HTML content with the contents of `path`.
    pub fn set_content_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = existing(path.as_ref())?;
        self.content = fs::read_to_string(path)?;
        Ok(())
    }

    /// Replace the inline CSS.
    pub fn set_css(&mut self, css: impl Into<String>) {
        self.css = css.into();
    }

    /// Append a stylesheet reference. Adding the same file twice links it
    /// twice.
    pub fn add_css_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = existing(path.as_ref())?;
        self.css_files.push(path.to_path_buf());
        Ok(())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn css_files(&self) -> &[PathBuf] {
        &self.css_files
    }

    /// `true` when there is no content; empty header/footer regions are left
    /// out of the conversion.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn stylesheet(&self) -> &str {
        if self.css.is_empty() {
            DEFAULT_CSS
        } else {
            &self.css
        }
    }

    fn css_links(&self) -> String {
        self.css_files
            .iter()
            .map(|f| {
                format!(
                    r#"<link rel="stylesheet" type="text/css" href="{}">"#,
                    escape_attr(&f.to_string_lossy())
                )
            })
            .collect()
    }

    fn page(&self, body_tail: &str) -> String {
        format!(
            concat!(
                r#"<!DOCTYPE html><html><head><meta charset="utf-8">"#,
                "<style>{css}</style>{links}</head><body>{content}{tail}</body></html>"
            ),
            css = self.stylesheet(),
            links = self.css_links(),
            content = self.content,
            tail = body_tail,
        )
    }

    /// Render as a standalone HTML page.
    pub fn render(&self, site_root: &str) -> String {
        parse_relative_links(&self.page(""), site_root)
    }

    /// Render as the header page, optionally with DIN 5008 folding marks.
    pub fn render_header(&self, folding_marks: bool, site_root: &str) -> String {
        let tail = if folding_marks { FOLDING_MARKS } else { "" };
        parse_relative_links(&self.page(tail), site_root)
    }

    /// Render as the footer. `page_numbers` carries the widget prefix when
    /// page numbers are enabled.
    pub fn render_footer(
        &self,
        mode: FooterMode,
        page_numbers: Option<&str>,
        site_root: &str,
    ) -> String {
        let html = match mode {
            FooterMode::FullPage => {
                let tail = page_numbers
                    .map(|prefix| format!("{}{PAGE_NUMBER_SCRIPT}", page_number_widget(prefix)))
                    .unwrap_or_default();
                self.page(&tail)
            }
            FooterMode::Fragment => format!(
                r#"<div id="document-body"><style>{}</style><style>{PAGE_COUNTER_CSS}</style>{}{}{}</div>"#,
                self.stylesheet(),
                self.css_links(),
                self.content,
                page_numbers.map(page_number_widget).unwrap_or_default(),
            ),
        };
        parse_relative_links(&html, site_root)
    }
}

fn existing(path: &Path) -> Result<&Path> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::FileNotFound(path.to_path_buf()))
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Prefix label plus the current/total page slots.
fn page_number_widget(prefix: &str) -> String {
    format!(
        concat!(
            r#"<div id="pages"><span id="pages_prefix">{}</span> "#,
            r#"<span id="pages_current"></span><span id="pages_total"></span></div>"#
        ),
        escape_text(prefix)
    )
}

/// The converter appends `sitepage`/`topage` to the footer URL for each page.
const PAGE_NUMBER_SCRIPT: &str = r#"<script>
var parts = document.location.href.split(/[?&]/);
var currentPage, totalPages;
for (var i = 0, len = parts.length; i < len; i++) {
    var param = parts[i].split("=");
    switch (param[0]) {
        case "sitepage":
            currentPage = decodeURIComponent(param[1]);
            break;
        case "topage":
            totalPages = decodeURIComponent(param[1]);
            break;
    }
}
document.getElementById("pages_current").innerHTML = currentPage + " / ";
document.getElementById("pages_total").innerHTML = totalPages;
</script>"#;

const PAGE_COUNTER_CSS: &str =
    "#pages_current:after { counter-increment: page; content: counter(page); }";

const FOLDING_MARKS: &str = r#"<div class="folding-marks"><div class="folding-mark din-5008-f1"></div><div class="folding-mark din-5008-f2"></div><div class="folding-mark din-5008-hole"></div></div>
<style>
.folding-marks { height: 100%; left: 0; position: fixed; top: 0; width: 100%; }
.folding-mark { background: #000; height: 1px; left: 0; position: absolute; width: 40px; }
.din-5008-f1 { top: 105mm; }
.din-5008-f2 { top: 210mm; }
.din-5008-hole { top: 148.5mm; }
</style>"#;

fn media_cache_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(\s)(href|src)(\s*=\s*)(["'])/media/cache/"#)
            .expect("media cache pattern is valid")
    })
}

/// Rewrite `href`/`src` values starting with `/media/cache/` to absolute
/// paths under `site_root`. Attribute names match case-insensitively and
/// only as whole attributes (`data-src` is left alone); the quote character
/// is kept.
pub fn parse_relative_links(html: &str, site_root: &str) -> String {
    let root = site_root.trim_end_matches('/');
    media_cache_link()
        .replace_all(html, |caps: &Captures<'_>| {
            format!(
                "{}{}{}{}{root}{MEDIA_CACHE_PREFIX}",
                &caps[1], &caps[2], &caps[3], &caps[4]
            )
        })
        .into_owned()
}
