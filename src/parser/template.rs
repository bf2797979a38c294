//! Brace templates.
//!
//! Both the message catalog (`"User {0} has logged on"`) and the line output
//! format (`"{time:32} {label} {msg}"`) use the same brace syntax. A template is
//! compiled once into an ordered list of [`Segment`]s so that rendering and
//! argument extraction never re-parse the source string.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unmatched '{{' at offset {0}")]
    UnclosedBrace(usize),
    #[error("single '}}' at offset {0} (use '}}}}' for a literal brace)")]
    StrayClosingBrace(usize),
    #[error("invalid placeholder '{{{placeholder}}}': {reason}")]
    InvalidPlaceholder { placeholder: String, reason: String },
}

/// Placeholder kinds know how wide their rendered value is at least, which
/// lets extraction skip over padding before looking for the next literal.
pub trait Placeholder {
    fn min_width(&self) -> usize {
        0
    }
}

impl Placeholder for usize {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<P> {
    Literal(String),
    Placeholder(P),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<P> {
    source: String,
    segments: Vec<Segment<P>>,
}

impl<P: Placeholder> Template<P> {
    /// Compile `source`, handing the text between each pair of braces to
    /// `placeholder`. `{{` and `}}` are literal braces.
    pub fn compile<F>(source: &str, mut placeholder: F) -> Result<Self, TemplateError>
    where
        F: FnMut(&str) -> Result<P, String>,
    {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        if c == '{' {
                            return Err(TemplateError::UnclosedBrace(offset));
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedBrace(offset));
                    }
                    let parsed =
                        placeholder(&inner).map_err(|reason| TemplateError::InvalidPlaceholder {
                            placeholder: inner.clone(),
                            reason,
                        })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(parsed));
                }
                '}' => return Err(TemplateError::StrayClosingBrace(offset)),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment<P>] {
        &self.segments
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &P> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Split `text` on the template's literals and return the slice that each
    /// placeholder occupies, in template order.
    ///
    /// Extraction stops at the first literal that does not match; the returned
    /// vector is then shorter than the number of placeholders and callers decide
    /// how to fill the gap. A placeholder's slice is at least `min_width()`
    /// characters long, so padded values containing the next literal survive.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut values = Vec::new();
        let mut cursor = 0;

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if !text[cursor..].starts_with(literal.as_str()) {
                        break;
                    }
                    cursor += literal.len();
                }
                Segment::Placeholder(placeholder) => {
                    let start = cursor;
                    let search_from = advance_chars(text, start, placeholder.min_width());
                    let end = match self.segments.get(index + 1) {
                        None => text.len(),
                        Some(Segment::Placeholder(_)) => search_from,
                        Some(Segment::Literal(next)) if index + 2 == self.segments.len() => {
                            // Trailing literal: anchor it at the end of the text.
                            match text.len().checked_sub(next.len()) {
                                Some(tail) if tail >= search_from && text.ends_with(next.as_str()) => tail,
                                _ => break,
                            }
                        }
                        Some(Segment::Literal(next)) => match text[search_from..].find(next.as_str()) {
                            Some(found) => search_from + found,
                            None => break,
                        },
                    };
                    values.push(&text[start..end]);
                    cursor = end;
                }
            }
        }

        values
    }
}

/// Byte offset reached by moving `count` characters forward from `start`,
/// clamped to the end of `text`.
fn advance_chars(text: &str, start: usize, count: usize) -> usize {
    if count == 0 {
        return start;
    }
    text[start..]
        .char_indices()
        .nth(count)
        .map_or(text.len(), |(offset, _)| start + offset)
}

/// Placeholder compiler for positional templates: `{0}`, `{1}`, ...
pub fn positional(inner: &str) -> Result<usize, String> {
    inner
        .trim()
        .parse::<usize>()
        .map_err(|_| "expected a positional index such as {0}".to_string())
}
