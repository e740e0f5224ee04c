//! Firecrawl Client Contract Tests
//!
//! Verify request shapes sent to the collaborator, response parsing, and
//! mapping of error statuses onto failures that need user action.

use fathom_fetch::{
    FailureKind, FetchConfig, FetchError, FirecrawlClient, ScrapeRequest, SearchRequest,
    WebFetcher,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> FirecrawlClient {
    let config = FetchConfig::default()
        .with_api_key("fc-test")
        .with_base_url(&server.uri())
        .with_max_retries(1);
    FirecrawlClient::new(config).unwrap()
}

#[tokio::test]
async fn test_search_request_and_parsing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .and(header("authorization", "Bearer fc-test"))
        .and(body_partial_json(json!({
            "query": "us unemployment rate",
            "limit": 40,
            "scrapeOptions": {"formats": ["markdown"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {
                    "url": "https://www.bls.gov/cps/",
                    "title": "Labor Force Statistics",
                    "description": "CPS overview",
                    "markdown": "The unemployment rate was 3.9% in 2024."
                },
                {
                    "url": "https://example.com/no-title",
                    "metadata": {"title": "From metadata"}
                },
                {
                    "title": "Missing url is dropped"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let hits = client
        .search("us unemployment rate", &SearchRequest::default().with_limit(40))
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "Labor Force Statistics");
    assert!(hits[0].content().contains("3.9%"));
    assert_eq!(hits[1].title, "From metadata");
    assert_eq!(hits[1].content(), "");
}

#[tokio::test]
async fn test_scrape_request_and_parsing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({
            "url": "https://www.census.gov/data",
            "formats": ["markdown", "html"],
            "onlyMainContent": true,
            "waitFor": 2000,
            "includeTags": ["table", "figure", "data", "stats"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "markdown": "# Census data",
                "html": "<table><tr><td>Population</td><td>334,914,895</td></tr></table>",
                "metadata": {"title": "Census Data", "statusCode": 200}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let page = client
        .scrape("https://www.census.gov/data", &ScrapeRequest::default())
        .await
        .unwrap();

    assert_eq!(page.title.as_deref(), Some("Census Data"));
    assert_eq!(page.markdown, "# Census data");
    assert!(page.html.contains("334,914,895"));
}

#[tokio::test]
async fn test_unsuccessful_scrape_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Page blocked"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .scrape("https://blocked.example.com", &ScrapeRequest::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Page blocked"));
    assert!(!err.requires_user_action());
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let cases = [
        (401, FailureKind::InvalidCredential, true),
        (402, FailureKind::InsufficientCredits, true),
        (429, FailureKind::RateLimited, true),
        (504, FailureKind::TimedOut, false),
    ];

    for (status, kind, needs_action) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .search("anything", &SearchRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.collaborator_failure().unwrap().kind, kind);
        assert_eq!(err.requires_user_action(), needs_action);
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .search("anything", &SearchRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_missing_key_never_reaches_the_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = FetchConfig::default().with_base_url(&server.uri());
    let client = FirecrawlClient::new(config).unwrap();
    let err = client
        .search("anything", &SearchRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MissingApiKey));
    assert!(err.requires_user_action());
}

#[tokio::test]
async fn test_pdf_download_failure_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a pdf".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .fetch_pdf_text(&format!("{}/report.pdf", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Pdf(_)));
}

#[tokio::test]
async fn test_document_host_statuses_are_not_collaborator_failures() {
    for status in [401u16, 402, 429, 504] {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/paywalled.pdf"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_pdf_text(&format!("{}/paywalled.pdf", server.uri()))
            .await
            .unwrap_err();

        assert!(
            matches!(err, FetchError::Status { status: s, .. } if s == status),
            "status {} gave {:?}",
            status,
            err
        );
        assert!(err.collaborator_failure().is_none());
        assert!(!err.requires_user_action());
    }
}

#[tokio::test]
async fn test_oversized_document_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/huge.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![b'x'; fathom_fetch::MAX_DOCUMENT_BYTES + 1]),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .fetch_pdf_text(&format!("{}/huge.pdf", server.uri()))
        .await
        .unwrap_err();

    match err {
        FetchError::Pdf(message) => assert!(message.contains("byte limit")),
        other => panic!("expected size rejection, got {:?}", other),
    }
}
