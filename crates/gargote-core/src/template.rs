//! `{{ .name }}` placeholder substitution against the variable environment.

use std::collections::HashMap;

use crate::error::GargoteError;
use crate::json::{resolve_path, JsonValue};

/// Captured values of one stage invocation, keyed by variable name.
pub type Variables = HashMap<String, JsonValue>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    /// `{{ .name }}` or `{{ .name.sub.path }}`.
    Placeholder { name: &'a str, path: Option<&'a str> },
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, GargoteError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open.find(CLOSE).ok_or_else(|| {
            GargoteError::Template(format!(
                "unclosed placeholder at byte {} in \"{}\"",
                offset + start,
                template
            ))
        })?;
        segments.push(parse_placeholder(after_open[..end].trim(), template)?);

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn parse_placeholder<'a>(inner: &'a str, template: &str) -> Result<Segment<'a>, GargoteError> {
    let malformed = || {
        GargoteError::Template(format!(
            "malformed placeholder \"{{{{{inner}}}}}\" in \"{template}\", expected {{{{ .name }}}}"
        ))
    };

    let reference = inner.strip_prefix('.').ok_or_else(malformed)?;
    let valid = !reference.is_empty()
        && reference.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
    if !valid {
        return Err(malformed());
    }

    Ok(match reference.split_once('.') {
        Some((name, path)) => Segment::Placeholder {
            name,
            path: Some(path),
        },
        None => Segment::Placeholder {
            name: reference,
            path: None,
        },
    })
}

fn lookup<'v>(
    variables: &'v Variables,
    name: &str,
    path: Option<&str>,
) -> Result<&'v JsonValue, GargoteError> {
    let value = variables
        .get(name)
        .ok_or_else(|| GargoteError::Template(format!("variable \"{name}\" is not defined")))?;
    match path {
        Some(path) => resolve_path(value, path).map_err(|e| {
            GargoteError::Template(format!("variable \"{name}\": {e}"))
        }),
        None => Ok(value),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Check placeholder syntax without substituting anything.
pub fn check_syntax(template: &str) -> Result<(), GargoteError> {
    if template.contains(OPEN) {
        parse(template)?;
    }
    Ok(())
}

/// Replace every placeholder in `template` with the text form of the named
/// variable. Strings without `{{` are returned as they are.
pub fn render(template: &str, variables: &Variables) -> Result<String, GargoteError> {
    if !template.contains(OPEN) {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder { name, path } => {
                out.push_str(&lookup(variables, name, path)?.to_string());
            }
        }
    }
    Ok(out)
}

/// Resolve placeholders in every string leaf of a JSON body.
///
/// A leaf made of a single placeholder (surrounding whitespace allowed) is
/// replaced by the variable's value itself, keeping its JSON type.
pub fn render_json(value: &JsonValue, variables: &Variables) -> Result<JsonValue, GargoteError> {
    match value {
        JsonValue::String(s) => render_json_string(s, variables),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| render_json(item, variables))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        JsonValue::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), render_json(v, variables)?)))
            .collect::<Result<HashMap<_, _>, GargoteError>>()
            .map(JsonValue::Object),
        scalar => Ok(scalar.clone()),
    }
}

fn render_json_string(s: &str, variables: &Variables) -> Result<JsonValue, GargoteError> {
    if !s.contains(OPEN) {
        return Ok(JsonValue::String(s.to_string()));
    }

    let segments = parse(s)?;
    let mut placeholders = segments
        .iter()
        .filter(|seg| !matches!(seg, Segment::Literal(text) if text.trim().is_empty()));
    if let (Some(Segment::Placeholder { name, path }), None) =
        (placeholders.next(), placeholders.next())
    {
        return lookup(variables, name, *path).cloned();
    }

    render(s, variables).map(JsonValue::String)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
