//! Terminal server payload delivered with a completed upload.

use serde::{Deserialize, Serialize};

/// What the server said when the upload finished.
///
/// HTTP tasks carry the real response; protocols without a response
/// body (FTP) use [`ServerResponse::successful_empty`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerResponse {
    pub code: u16,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ServerResponse {
    /// The empty 200 used by protocols that have no response payload.
    pub fn successful_empty() -> Self {
        Self {
            code: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// 2xx/3xx codes count as success.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.code)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
