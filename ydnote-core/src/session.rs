use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const CSTK_COOKIE: &str = "YNOTE_CSTK";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cookie file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cookie entry {index} is malformed (expected [name, value, ...])")]
    MalformedEntry { index: usize },
    #[error("cookie file has no {CSTK_COOKIE} cookie; log in again and re-export cookies")]
    MissingCstk,
}

#[derive(Debug, Deserialize)]
struct CookieFile {
    cookies: Vec<serde_json::Value>,
}

/// Web session captured from a logged-in browser. The `YNOTE_CSTK` cookie
/// doubles as the anti-forgery token every API call carries as `cstk`.
#[derive(Debug, Clone)]
pub struct CookieSession {
    pairs: Vec<(String, String)>,
    cstk: String,
}

impl CookieSession {
    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SessionError> {
        let file: CookieFile = serde_json::from_str(raw)?;
        let mut pairs = Vec::with_capacity(file.cookies.len());
        for (index, row) in file.cookies.iter().enumerate() {
            // Rows are exported as [name, value, domain, path]; only the
            // first two matter for the Cookie header.
            let fields = row
                .as_array()
                .ok_or(SessionError::MalformedEntry { index })?;
            let name = fields
                .first()
                .and_then(|v| v.as_str())
                .ok_or(SessionError::MalformedEntry { index })?;
            let value = fields
                .get(1)
                .and_then(|v| v.as_str())
                .ok_or(SessionError::MalformedEntry { index })?;
            pairs.push((name.to_string(), value.to_string()));
        }

        let cstk = pairs
            .iter()
            .find(|(name, _)| name == CSTK_COOKIE)
            .map(|(_, value)| value.clone())
            .ok_or(SessionError::MissingCstk)?;

        Ok(Self { pairs, cstk })
    }

    pub fn cstk(&self) -> &str {
        &self.cstk
    }

    pub fn cookie_header(&self) -> String {
        self.pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[doc(hidden)]
    pub fn for_tests(cstk: &str) -> Self {
        Self {
            pairs: vec![(CSTK_COOKIE.to_string(), cstk.to_string())],
            cstk: cstk.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exported_cookie_rows() {
        let session = CookieSession::from_json(
            r#"{"cookies": [
                ["YNOTE_LOGIN", "8||abc", "note.youdao.com", "/"],
                ["YNOTE_CSTK", "tok123", "note.youdao.com", "/"]
            ]}"#,
        )
        .unwrap();

        assert_eq!(session.cstk(), "tok123");
        assert_eq!(
            session.cookie_header(),
            "YNOTE_LOGIN=8||abc; YNOTE_CSTK=tok123"
        );
    }

    #[test]
    fn tolerates_rows_with_extra_fields() {
        let session = CookieSession::from_json(
            r#"{"cookies": [["YNOTE_CSTK", "t", "note.youdao.com", "/", 1700000000, true]]}"#,
        )
        .unwrap();
        assert_eq!(session.cstk(), "t");
    }

    #[test]
    fn missing_cstk_is_an_error() {
        let err = CookieSession::from_json(r#"{"cookies": [["OTHER", "v", "d", "/"]]}"#)
            .expect_err("expected missing cstk");
        assert!(matches!(err, SessionError::MissingCstk));
    }

    #[test]
    fn malformed_row_reports_index() {
        let err = CookieSession::from_json(r#"{"cookies": [["A", "b"], "oops"]}"#)
            .expect_err("expected malformed row");
        assert!(matches!(err, SessionError::MalformedEntry { index: 1 }));
    }
}
