//! Rewrites template text into plain Tera syntax.
//!
//! With the default delimiters the text already is Tera; only dotted paths
//! (`{{ .values.x }}`) are rewritten to `values.x`. With custom delimiters
//! `S expr E`, `S% stmt %E` and `S# note #E` become their Tera counterparts and
//! literal text that happens to contain Tera markers is wrapped in a raw block.
//! No newline is added or removed, so line numbers survive.
//!
//! [`translate`] also keeps a byte offset map, so positions reported against
//! the Tera text can be shown on the template as written.

use regex::Regex;

use crate::delimiter::Delimiters;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tag {
    Expression,
    Statement,
    Comment,
}

impl Tag {
    fn tera_open(self) -> &'static str {
        match self {
            Tag::Expression => "{{",
            Tag::Statement => "{%",
            Tag::Comment => "{#",
        }
    }

    fn tera_close(self) -> &'static str {
        match self {
            Tag::Expression => "}}",
            Tag::Statement => "%}",
            Tag::Comment => "#}",
        }
    }
}

const TERA_MARKERS: [&str; 3] = ["{{", "{%", "{#"];

/// Tera source plus, for every byte of it, the offset of the source byte it
/// came from. Inserted markers point at the source byte that follows them.
#[derive(Debug, Clone)]
pub struct Translation {
    text: String,
    origin: Vec<usize>,
    source_len: usize,
}

impl Translation {
    fn new(source_len: usize) -> Self {
        Self { text: String::with_capacity(source_len), origin: Vec::with_capacity(source_len), source_len }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn copy(&mut self, text: &str, at: usize) {
        self.text.push_str(text);
        self.origin.extend(at..at + text.len());
    }

    fn insert(&mut self, text: &str, at: usize) {
        self.text.push_str(text);
        self.origin.extend(std::iter::repeat(at).take(text.len()));
    }

    fn source_offset(&self, offset: usize) -> usize {
        self.origin.get(offset).copied().unwrap_or(self.source_len)
    }

    /// Map a `(line, column)` of the Tera source back onto `source`.
    pub fn source_position(&self, source: &str, line: usize, column: usize) -> (usize, usize) {
        match offset_of(&self.text, line, column) {
            Some(offset) => position_of(source, self.source_offset(offset)),
            None => (line, column),
        }
    }

    /// Position in `source` of the first tag that references the variable
    /// `path`. Literal text, comments and raw blocks are skipped.
    pub fn locate_reference(&self, source: &str, path: &str) -> Option<(usize, usize)> {
        let text = self.text.as_str();
        let mut i = 0;
        while let Some(rel) = text[i..].find('{') {
            let at = i + rel;
            let close = match text[at..].get(..2) {
                Some("{{") => "}}",
                Some("{%") => "%}",
                Some("{#") => "#}",
                _ => {
                    i = at + 1;
                    continue;
                }
            };
            let body_start = at + 2;
            let Some(body_len) = text[body_start..].find(close) else { break };
            let body = &text[body_start..body_start + body_len];
            let end = body_start + body_len + close.len();

            if close == "%}" && body.trim_matches(|c: char| c == '-' || c.is_whitespace()) == "raw" {
                match text[end..].find("endraw") {
                    Some(rel) => i = end + rel,
                    None => break,
                }
                continue;
            }
            if close != "#}" {
                if let Some(idx) = find_reference(body, path) {
                    let mut offset = self.source_offset(body_start + idx);
                    if offset > 0 && source.as_bytes().get(offset - 1) == Some(&b'.') {
                        offset -= 1;
                    }
                    return Some(position_of(source, offset));
                }
            }
            i = end;
        }
        None
    }

    /// `(variable, collection)` of every `for` tag, outermost first.
    pub fn loop_bindings(&self) -> Vec<(String, String)> {
        let Ok(re) = Regex::new(r"\{%-?\s*for\s+(?:[A-Za-z_]\w*\s*,\s*)?([A-Za-z_]\w*)\s+in\s+([A-Za-z_][\w.]*)")
        else {
            return Vec::new();
        };
        re.captures_iter(&self.text).map(|caps| (caps[1].to_string(), caps[2].to_string())).collect()
    }
}

/// Byte offset of `path` in `body` where it is a whole variable reference.
fn find_reference(body: &str, path: &str) -> Option<usize> {
    let is_path_char = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.');
    body.match_indices(path).map(|(idx, _)| idx).find(|&idx| {
        let before = body[..idx].chars().next_back();
        let after = body[idx + path.len()..].chars().next();
        !before.is_some_and(is_path_char) && !after.is_some_and(is_path_char)
    })
}

/// Byte offset of the 1-based `line` and 0-based character `column`.
fn offset_of(text: &str, line: usize, column: usize) -> Option<usize> {
    let mut start = 0;
    for (idx, content) in text.split('\n').enumerate() {
        if idx + 1 == line {
            let within = content.char_indices().nth(column).map_or(content.len(), |(i, _)| i);
            return Some(start + within);
        }
        start += content.len() + 1;
    }
    None
}

/// 1-based line and 0-based character column of byte `offset`.
fn position_of(text: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (before.matches('\n').count() + 1, before[line_start..].chars().count())
}

/// Translate `source` written with `delims` into Tera source.
pub fn to_tera(source: &str, delims: &Delimiters) -> String {
    translate(source, delims).text
}

/// [`to_tera`], keeping the offset map back to `source`.
pub fn translate(source: &str, delims: &Delimiters) -> Translation {
    let custom = !delims.is_default();
    let tags: Vec<(String, String, Tag)> = if custom {
        vec![
            (format!("{}%", delims.start), format!("%{}", delims.end), Tag::Statement),
            (format!("{}#", delims.start), format!("#{}", delims.end), Tag::Comment),
            (delims.start.clone(), delims.end.clone(), Tag::Expression),
        ]
    } else {
        [Tag::Expression, Tag::Statement, Tag::Comment]
            .into_iter()
            .map(|t| (t.tera_open().to_string(), t.tera_close().to_string(), t))
            .collect()
    };

    let mut out = Translation::new(source.len());
    let mut pos = 0;
    loop {
        let rest = &source[pos..];
        let next = tags
            .iter()
            .filter_map(|(open, close, tag)| rest.find(open.as_str()).map(|i| (i, open, close, *tag)))
            // earliest match; on a tie the longer opener wins
            .min_by_key(|(i, open, _, _)| (*i, usize::MAX - open.len()));

        let Some((at, open, close, tag)) = next else {
            push_literal(&mut out, rest, pos, custom);
            break;
        };

        push_literal(&mut out, &rest[..at], pos, custom);
        let body_start = at + open.len();
        let Some(body_len) = find_close(&rest[body_start..], close) else {
            // unterminated tag; leave it for the parser to report
            push_literal(&mut out, &rest[at..], pos + at, custom);
            break;
        };
        let body = &rest[body_start..body_start + body_len];

        out.insert(tag.tera_open(), pos + at);
        match tag {
            Tag::Comment => out.copy(body, pos + body_start),
            _ => push_expression(&mut out, body, pos + body_start),
        }
        let close_at = pos + body_start + body_len;
        out.insert(tag.tera_close(), close_at);
        pos = close_at + close.len();
    }
    out
}

fn push_literal(out: &mut Translation, text: &str, at: usize, escape: bool) {
    if escape && TERA_MARKERS.iter().any(|m| text.contains(m)) {
        out.insert("{% raw %}", at);
        out.copy(text, at);
        out.insert("{% endraw %}", at + text.len());
    } else {
        out.copy(text, at);
    }
}

fn push_expression(out: &mut Translation, expr: &str, at: usize) {
    let mut copied = 0;
    for dot in leading_dots(expr) {
        out.copy(&expr[copied..dot], at + copied);
        copied = dot + 1;
    }
    out.copy(&expr[copied..], at + copied);
}

/// Byte offset of the first `close` in `body` outside string literals.
fn find_close(body: &str, close: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if body[i..].starts_with(close) {
            return Some(i);
        }
        if matches!(c, '"' | '\'' | '`') {
            quote = Some(c);
        }
    }
    None
}

/// Byte offsets of the dots that start a variable path; `.values.x` becomes
/// `values.x`.
///
/// A dot is a path start when it does not follow an identifier, a closing
/// bracket or a quote, and is followed by a letter or `_`. String literals are
/// left alone.
fn leading_dots(expr: &str) -> Vec<usize> {
    let chars: Vec<(usize, char)> = expr.char_indices().collect();
    let mut dots = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, &(offset, c)) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if matches!(c, '"' | '\'' | '`') {
            quote = Some(c);
            continue;
        }
        if c == '.' {
            let prev = i.checked_sub(1).map(|p| chars[p].1);
            let next = chars.get(i + 1).map(|&(_, n)| n);
            let continues_path = prev.is_some_and(|p| {
                p.is_alphanumeric() || matches!(p, '_' | ')' | ']' | '"' | '\'' | '`')
            });
            let starts_name = next.is_some_and(|n| n.is_alphabetic() || n == '_');
            if !continues_path && starts_name {
                dots.push(offset);
            }
        }
    }
    dots
}
