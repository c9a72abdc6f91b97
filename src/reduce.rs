//! Shrinks fetched menu HTML to the markup that carries menu text.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Everything from this marker on is a sustainability disclosure repeated on every food2050 page.
pub const BOILERPLATE_MARKER: &str = "Klimawirkung";

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "pre", "textarea"];

const BLOCK_TAGS: &[&str] = &[
    "!doctype", "html", "head", "body", "meta", "link", "title", "div", "section", "main",
    "article", "header", "footer", "nav", "aside", "p", "ul", "ol", "li", "table", "thead",
    "tbody", "tfoot", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "br", "hr", "form",
];

const MEDIA_TAGS: &[&str] = &[
    "style", "script", "svg", "iframe", "video", "audio", "canvas", "path", "object",
];

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--[\s\S]*?-->").expect("COMMENT_RE should compile"));

static MEDIA_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    MEDIA_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"<{tag}[^>]*>[\s\S]*?</{tag}>")).expect("media pattern should compile")
        })
        .collect()
});

static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img[^>]*>").expect("IMG_RE should compile"));

static HIDDEN_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<[^>]* hidden[^>]*>[\s\S]*?</[^>]*>",
        r#"<[^>]* style="[^"]*display:\s*none[^"]*"[^>]*>[\s\S]*?</[^>]*>"#,
        r#"<[^>]* style='[^']*display:\s*none[^']*'[^>]*>[\s\S]*?</[^>]*>"#,
        r#"<[^>]* style="[^"]*visibility:\s*hidden[^"]*"[^>]*>[\s\S]*?</[^>]*>"#,
        r#"<[^>]* style='[^']*visibility:\s*hidden[^']*'[^>]*>[\s\S]*?</[^>]*>"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("hidden pattern should compile"))
    .collect()
});

static NOISE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s(?:class|style|target)\s*=\s*(?:"[^"]*"|'[^']*')"#)
        .expect("NOISE_ATTR_RE should compile")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MinifyError {
    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),
    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),
}

/// Runs the full reduction pipeline. Never fails; a broken minify pass
/// leaves the input untouched for the later steps.
pub fn reduce(html: &str) -> String {
    let minified = match minify(html) {
        Ok(minified) => {
            if !html.is_empty() {
                debug!(
                    from = html.len(),
                    to = minified.len(),
                    ratio = format!("{:.1}%", minified.len() as f64 / html.len() as f64 * 100.0),
                    "minified HTML"
                );
            }
            minified
        }
        Err(err) => {
            warn!(error = %err, "error minifying HTML, using original content");
            html.to_string()
        }
    };

    let cleaned = strip_structure(&minified);
    let stripped = strip_attributes(&cleaned);
    truncate_boilerplate(&stripped).to_string()
}

/// Drops comments, media and hidden elements, then decodes the common entities.
pub fn strip_structure(html: &str) -> String {
    let mut result = COMMENT_RE.replace_all(html, "").into_owned();
    for re in MEDIA_RES.iter() {
        result = re.replace_all(&result, "").into_owned();
    }
    result = IMG_RE.replace_all(&result, "").into_owned();
    for re in HIDDEN_RES.iter() {
        result = re.replace_all(&result, "").into_owned();
    }

    result
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Removes `class`, `style` and `target` attributes.
pub fn strip_attributes(html: &str) -> String {
    NOISE_ATTR_RE.replace_all(html, "").into_owned()
}

pub fn truncate_boilerplate(text: &str) -> &str {
    match text.find(BOILERPLATE_MARKER) {
        Some(index) => &text[..index],
        None => text,
    }
}

/// Collapses whitespace in text and inside tags. Quoted attribute values
/// and the bodies of `script`, `style`, `pre` and `textarea` are copied verbatim.
pub fn minify(html: &str) -> Result<String, MinifyError> {
    let mut out = String::with_capacity(html.len());
    let mut i = 0;
    let mut pending_space = false;
    // Name of the tag last written, `None` once text follows it.
    let mut last_tag: Option<String> = None;

    while i < html.len() {
        let rest = &html[i..];

        if rest.starts_with("<!--") {
            let end = rest[4..]
                .find("-->")
                .map(|pos| i + 4 + pos + 3)
                .ok_or(MinifyError::UnterminatedComment(i))?;
            // Whitespace before a comment is written with whatever follows it.
            out.push_str(&html[i..end]);
            i = end;
            continue;
        }

        if starts_markup(rest) {
            let (tag, end) = minify_tag(html, i)?;
            let name = tag_name(&tag);
            if pending_space {
                let around_block = last_tag.as_deref().is_some_and(is_block) || is_block(&name);
                if !out.is_empty() && !around_block {
                    out.push(' ');
                }
                pending_space = false;
            }
            out.push_str(&tag);
            i = end;

            let opening = !tag.starts_with("</") && !tag.ends_with("/>");
            if opening && RAW_TEXT_TAGS.contains(&name.as_str()) {
                let close = html[i..]
                    .to_ascii_lowercase()
                    .find(&format!("</{name}"))
                    .map_or(html.len(), |pos| i + pos);
                out.push_str(&html[i..close]);
                i = close;
            }
            last_tag = Some(name);
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        i += ch.len_utf8();
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let after_block = last_tag.as_deref().is_some_and(is_block);
            if !out.is_empty() && !after_block {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(ch);
        last_tag = None;
    }

    Ok(out)
}

fn starts_markup(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<')
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
}

fn minify_tag(html: &str, start: usize) -> Result<(String, usize), MinifyError> {
    let mut tag = String::from("<");
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for (offset, ch) in html[start + 1..].char_indices() {
        if let Some(q) = quote {
            tag.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '>' => {
                tag.push('>');
                return Ok((tag, start + 1 + offset + 1));
            }
            '=' => {
                pending_space = false;
                tag.push('=');
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && !tag.ends_with('=') && !tag.ends_with('<') {
                    tag.push(' ');
                }
                pending_space = false;
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                tag.push(c);
            }
        }
    }

    Err(MinifyError::UnterminatedTag(start))
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '!')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}
