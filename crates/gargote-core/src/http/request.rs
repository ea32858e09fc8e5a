use crate::definition::model::{HttpMethod, Query};
use crate::error::GargoteError;
use crate::json::JsonValue;
use crate::template::{render, render_json, Variables};

/// Body of a prepared request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Json(JsonValue),
}

/// A query with every template resolved, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// Resolve the templates of `query` against `variables`.
///
/// The body is resolved first, then the URL, headers and query parameters.
/// A text body wins over a JSON body; only one is sent.
pub fn prepare_request(query: &Query, variables: &Variables) -> Result<PreparedRequest, GargoteError> {
    let body = if let Some(text) = query.text_body() {
        Some(RequestBody::Text(
            render(text, variables).map_err(unusable("text body"))?,
        ))
    } else if let Some(json) = &query.body_json {
        Some(RequestBody::Json(
            render_json(json, variables).map_err(unusable("json body"))?,
        ))
    } else {
        None
    };

    let url = render(&query.url, variables).map_err(unusable("url"))?;

    let headers = query
        .headers
        .iter()
        .map(|(name, value)| {
            render(value, variables)
                .map(|v| (name.clone(), v))
                .map_err(unusable(&format!("header '{name}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let params = query
        .params
        .iter()
        .map(|(name, value)| {
            render(value, variables)
                .map(|v| (name.clone(), v))
                .map_err(unusable(&format!("param '{name}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PreparedRequest {
        method: query.method,
        url,
        headers,
        params,
        body,
    })
}

/// Prefix a template failure with the part of the query it came from.
fn unusable(part: &str) -> impl Fn(GargoteError) -> GargoteError + '_ {
    move |err| match err {
        GargoteError::Template(msg) => GargoteError::Template(format!("{part} is not usable: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_query(url: &str) -> Query {
        Query {
            url: url.to_string(),
            ..Query::default()
        }
    }

    fn make_vars(pairs: &[(&str, JsonValue)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn resolves_url_headers_and_params() {
        let mut query = make_query("http://{{ .host }}/users/{{ .id }}");
        query
            .headers
            .insert("Authorization".to_string(), "Bearer {{ .token }}".to_string());
        query
            .params
            .insert("page".to_string(), "{{ .page }}".to_string());
        let vars = make_vars(&[
            ("host", "example.com".into()),
            ("id", JsonValue::Integer(7)),
            ("token", "abc-123".into()),
            ("page", JsonValue::Integer(2)),
        ]);

        let prepared = prepare_request(&query, &vars).unwrap();
        assert_eq!(prepared.url, "http://example.com/users/7");
        assert_eq!(
            prepared.headers,
            vec![("Authorization".to_string(), "Bearer abc-123".to_string())]
        );
        assert_eq!(prepared.params, vec![("page".to_string(), "2".to_string())]);
        assert!(prepared.body.is_none());
    }

    #[test]
    fn text_body_wins_over_json_body() {
        let mut query = make_query("http://example.com");
        query.body_text = Some("Hello {{ .name }}".to_string());
        query.body_json = Some(JsonValue::from_slice(br#"{"a": 1}"#).unwrap());
        let vars = make_vars(&[("name", "World".into())]);

        let prepared = prepare_request(&query, &vars).unwrap();
        assert_eq!(prepared.body, Some(RequestBody::Text("Hello World".to_string())));
    }

    #[test]
    fn json_body_leaves_are_resolved() {
        let mut query = make_query("http://example.com");
        query.body_json = Some(JsonValue::from_slice(br#"{"owner": "{{ .id }}"}"#).unwrap());
        let vars = make_vars(&[("id", JsonValue::Integer(7))]);

        let prepared = prepare_request(&query, &vars).unwrap();
        match prepared.body {
            Some(RequestBody::Json(body)) => {
                assert_eq!(
                    crate::json::resolve_path(&body, "owner").unwrap(),
                    &JsonValue::Integer(7)
                );
            }
            other => panic!("expected json body, got {other:?}"),
        }
    }

    #[test]
    fn malformed_url_template_is_template_error() {
        let query = make_query("http://example.com/{{ .id");
        let err = prepare_request(&query, &Variables::new()).unwrap_err();
        assert!(matches!(err, GargoteError::Template(ref m) if m.contains("url")));
    }

    #[test]
    fn missing_header_variable_is_template_error() {
        let mut query = make_query("http://example.com");
        query
            .headers
            .insert("X-Token".to_string(), "{{ .token }}".to_string());
        let err = prepare_request(&query, &Variables::new()).unwrap_err();
        assert!(matches!(err, GargoteError::Template(ref m) if m.contains("X-Token")));
    }

    #[test]
    fn method_is_carried_over() {
        let mut query = make_query("http://example.com");
        query.method = HttpMethod::Delete;
        let prepared = prepare_request(&query, &Variables::new()).unwrap();
        assert_eq!(prepared.method, HttpMethod::Delete);
    }
}
