//! Route path syntax checks.
//!
//! Captures are written `{name}` or `{*rest}`; `{{` and `}}` escape literal braces.

use crate::error::AppError;

/// Rejects paths the router cannot mount.
pub(crate) fn validate(path: &str) -> Result<(), AppError> {
    let invalid = |message: &'static str| AppError::InvalidRoute {
        message: message.into(),
        context: Some(path.to_owned().into()),
    };

    if !path.starts_with('/') {
        return Err(invalid("paths must start with '/'"));
    }

    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(invalid("captures are written as {name} or {*rest}"));
        }

        let captures = captures(segment).ok_or_else(|| invalid("unbalanced '{' or '}' in path"))?;
        for capture in captures {
            let name = capture.strip_prefix('*').unwrap_or(capture);
            if name.is_empty() {
                return Err(invalid("captures must be named"));
            }
            if capture.starts_with('*') && i + 1 != segments.len() {
                return Err(invalid("a {*rest} capture must be the last segment"));
            }
        }
    }

    Ok(())
}

/// The path with every capture name erased, so `/items/{id}` and `/items/{name}`
/// share a shape. Assumes `path` passed [`validate`].
pub(crate) fn shape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push_str("{{");
            },
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push_str("}}");
            },
            '{' => {
                let wildcard = chars.peek() == Some(&'*');
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                }
                out.push_str(if wildcard { "{*}" } else { "{}" });
            },
            c => out.push(c),
        }
    }

    out
}

/// Capture names in a segment, or `None` when its braces do not pair up.
fn captures(segment: &str) -> Option<Vec<&str>> {
    let mut found = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = segment.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (c, start) {
            ('{', None) if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                chars.next();
            },
            ('}', None) if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                chars.next();
            },
            ('{', None) => start = Some(i + 1),
            ('}', Some(from)) => {
                found.push(&segment[from..i]);
                start = None;
            },
            ('{' | '}', _) => return None,
            _ => {},
        }
    }

    start.is_none().then_some(found)
}
