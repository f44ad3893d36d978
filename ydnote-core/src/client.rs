use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::session::CookieSession;

const DEFAULT_BASE_URL: &str = "https://note.youdao.com";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid cookie header")]
    CookieHeader,
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api response is missing `{field}`; the listing contract has changed")]
    Shape { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    /// Session cookies rejected; re-login required.
    Auth,
    /// Response no longer matches the expected contract.
    Structural,
    /// Connection/proxy level failure on a single request.
    Network,
    Other,
}

impl ApiError {
    pub fn classification(&self) -> ApiErrorClass {
        match self {
            ApiError::Api { status, .. }
                if matches!(*status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
            {
                ApiErrorClass::Auth
            }
            ApiError::Shape { .. } => ApiErrorClass::Structural,
            ApiError::Request(err) if err.is_connect() || err.is_timeout() => {
                ApiErrorClass::Network
            }
            _ => ApiErrorClass::Other,
        }
    }
}

/// One entry of a remote directory listing. Times are epoch seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "dir")]
    pub is_dir: bool,
    #[serde(rename = "modifyTimeForSort", default)]
    pub modify_time: i64,
    #[serde(rename = "createTimeForSort", default)]
    pub create_time: i64,
}

#[derive(Debug, Deserialize)]
struct EntryWrapper {
    #[serde(rename = "fileEntry")]
    file_entry: FileEntry,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    entries: Option<Vec<EntryWrapper>>,
}

#[derive(Debug, Deserialize)]
struct RootResponse {
    #[serde(rename = "fileEntry")]
    file_entry: Option<FileEntry>,
}

/// Result of an authenticated raw-URL fetch. Non-success statuses are
/// reported here rather than raised, so callers can apply their own
/// per-reference recovery rules.
#[derive(Debug)]
pub struct FetchedUrl {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub final_url: Url,
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub struct YdnoteClient {
    http: Client,
    base_url: Url,
    cstk: String,
}

impl YdnoteClient {
    pub fn new(session: &CookieSession) -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_BASE_URL, session)
    }

    pub fn with_base_url(base_url: &str, session: &CookieSession) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let cookie = HeaderValue::from_str(&session.cookie_header())
            .map_err(|_| ApiError::CookieHeader)?;
        headers.insert(COOKIE, cookie);
        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            cstk: session.cstk().to_string(),
        })
    }

    /// Resolves the id of the account's root note directory.
    pub async fn root_dir_id(&self) -> Result<String, ApiError> {
        let mut url = self.endpoint("/yws/api/personal/file")?;
        url.query_pairs_mut()
            .append_pair("method", "getByPath")
            .append_pair("keyfrom", "web")
            .append_pair("cstk", &self.cstk);
        let response = self
            .http
            .post(url)
            .form(&[
                ("path", "/"),
                ("entire", "true"),
                ("purge", "false"),
                ("cstk", &self.cstk),
            ])
            .send()
            .await?;
        let payload: RootResponse = Self::handle_response(response).await?;
        Ok(payload
            .file_entry
            .ok_or(ApiError::Shape { field: "fileEntry" })?
            .id)
    }

    /// Lists one directory level in the order the service returns it.
    pub async fn list_dir(&self, dir_id: &str) -> Result<Vec<FileEntry>, ApiError> {
        let mut url = self.endpoint(&format!("/yws/api/personal/file/{dir_id}"))?;
        url.query_pairs_mut()
            .append_pair("all", "true")
            .append_pair("f", "true")
            .append_pair("len", "1000")
            .append_pair("sort", "1")
            .append_pair("isReverse", "false")
            .append_pair("method", "listPageByParentId")
            .append_pair("keyfrom", "web")
            .append_pair("cstk", &self.cstk);
        let response = self.http.get(url).send().await?;
        let payload: ListResponse = Self::handle_response(response).await?;
        let entries = payload
            .entries
            .ok_or(ApiError::Shape { field: "entries" })?;
        Ok(entries.into_iter().map(|e| e.file_entry).collect())
    }

    /// Downloads the raw content of one note or file.
    pub async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, ApiError> {
        let mut url = self.endpoint("/yws/api/personal/sync")?;
        url.query_pairs_mut()
            .append_pair("method", "download")
            .append_pair("keyfrom", "web")
            .append_pair("cstk", &self.cstk);
        let response = self
            .http
            .post(url)
            .form(&[
                ("fileId", file_id),
                ("version", "-1"),
                ("convert", "true"),
                ("editorType", "1"),
                ("editorVersion", "new-json-editor"),
                ("cstk", &self.cstk),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api { status, body });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Authenticated GET of an arbitrary URL (media, attachments). The final
    /// URL is reported because attachment filenames ride on its query string.
    pub async fn fetch_url(&self, url: &str) -> Result<FetchedUrl, ApiError> {
        let url = Url::parse(url)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let final_url = response.url().clone();
        let body = response.bytes().await?.to_vec();
        Ok(FetchedUrl {
            status,
            content_type,
            final_url,
            body,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Api { status, body })
        }
    }
}
