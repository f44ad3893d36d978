use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ydnote_core::{ApiError, ApiErrorClass, CookieSession, YdnoteClient};

fn test_client(server: &MockServer) -> YdnoteClient {
    let session = CookieSession::from_json(
        r#"{"cookies": [
            ["YNOTE_LOGIN", "8||login", "note.youdao.com", "/"],
            ["YNOTE_CSTK", "cstk-1", "note.youdao.com", "/"]
        ]}"#,
    )
    .unwrap();
    YdnoteClient::with_base_url(&server.uri(), &session).unwrap()
}

#[tokio::test]
async fn root_dir_id_posts_path_and_cstk() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/yws/api/personal/file"))
        .and(query_param("method", "getByPath"))
        .and(query_param("cstk", "cstk-1"))
        .and(header("cookie", "YNOTE_LOGIN=8||login; YNOTE_CSTK=cstk-1"))
        .and(body_string_contains("path=%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fileEntry": {
                "id": "ROOT-1",
                "name": "ROOT",
                "dir": true
            }
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert_eq!(client.root_dir_id().await.unwrap(), "ROOT-1");
}

#[tokio::test]
async fn list_dir_preserves_service_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/yws/api/personal/file/DIR-1"))
        .and(query_param("method", "listPageByParentId"))
        .and(query_param("len", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "entries": [
                {"fileEntry": {
                    "id": "F-2", "name": "b.note", "dir": false,
                    "modifyTimeForSort": 1700000200, "createTimeForSort": 1700000100
                }},
                {"fileEntry": {
                    "id": "F-1", "name": "a.md", "dir": false,
                    "modifyTimeForSort": 1700000300, "createTimeForSort": 1700000050
                }}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let entries = client.list_dir("DIR-1").await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "F-2");
    assert_eq!(entries[0].modify_time, 1700000200);
    assert!(!entries[0].is_dir);
    assert_eq!(entries[1].name, "a.md");
}

#[tokio::test]
async fn list_dir_without_entries_is_structural() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/yws/api/personal/file/DIR-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": 207})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.list_dir("DIR-1").await.expect_err("expected shape error");

    assert!(matches!(err, ApiError::Shape { field: "entries" }));
    assert_eq!(err.classification(), ApiErrorClass::Structural);
}

#[tokio::test]
async fn unauthorized_status_classifies_as_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/yws/api/personal/file/DIR-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("login required"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.list_dir("DIR-1").await.expect_err("expected api error");

    assert!(matches!(err, ApiError::Api { .. }));
    assert_eq!(err.classification(), ApiErrorClass::Auth);
}

#[tokio::test]
async fn fetch_file_returns_raw_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/yws/api/personal/sync"))
        .and(query_param("method", "download"))
        .and(body_string_contains("fileId=F-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<?xml version=\"1.0\"?>"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let bytes = client.fetch_file("F-1").await.unwrap();
    assert_eq!(bytes, b"<?xml version=\"1.0\"?>");
}

#[tokio::test]
async fn fetch_url_reports_status_without_failing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/yws/res/1/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let fetched = client
        .fetch_url(&format!("{}/yws/res/1/gone", server.uri()))
        .await
        .unwrap();

    assert_eq!(fetched.status.as_u16(), 404);
    assert_eq!(fetched.body, b"not here");
}

#[tokio::test]
async fn fetch_url_reports_final_url_after_redirect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/yws/api/personal/attach"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            format!("{}/real?filename=report.pdf", server.uri()).as_str(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/real"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(b"%PDF-"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let fetched = client
        .fetch_url(&format!("{}/yws/api/personal/attach", server.uri()))
        .await
        .unwrap();

    assert_eq!(fetched.status.as_u16(), 200);
    assert_eq!(
        fetched.content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(fetched.final_url.query(), Some("filename=report.pdf"));
}
