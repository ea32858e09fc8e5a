use std::collections::HashMap;

/// A response whose body has been read in full.
///
/// The body is read exactly once and then shared by validation and capture.
#[derive(Debug, Clone, Default)]
pub struct ResponseData {
    /// HTTP response status code (e.g. 200, 404).
    pub status: u16,

    /// Response headers keyed by lowercased name. When the server sends a
    /// header several times only the first value is kept.
    pub headers: HashMap<String, String>,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl ResponseData {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Body decoded as UTF-8, with replacement characters for invalid bytes.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
