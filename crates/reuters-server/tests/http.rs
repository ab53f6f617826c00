use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use tower::util::ServiceExt;

use reuters_server::handlers::{AppState, router};
use reuters_server::rate_limit::RateLimiterLayer;
use reuters_server::store::DocumentStore;
use reuters_sgml::LoadOptions;

const CORPUS: &str = r#"<!DOCTYPE lewis SYSTEM "lewis.dtd">
<REUTERS TOPICS="YES" OLDID="5544" NEWID="1">
<DATE>26-FEB-1987 15:01:01.79</DATE>
<TOPICS><D>cocoa</D></TOPICS><PLACES><D>el-salvador</D><D>usa</D></PLACES>
<TEXT>&#2;
<TITLE>BAHIA COCOA REVIEW</TITLE>
<DATELINE>    SALVADOR, Feb 26 - </DATELINE><BODY>Showers continued throughout the week.
 Reuter
&#3;</BODY></TEXT>
</REUTERS>
<REUTERS TOPICS="YES" OLDID="5545" NEWID="2">
<DATE> 5-MAR-1987 10:20:00.00</DATE>
<TOPICS><D>acq</D></TOPICS><PLACES><D>usa</D></PLACES><EXCHANGES><D>nyse</D></EXCHANGES>
<TEXT><TITLE>AT&T BUYS STAKE</TITLE><AUTHOR>By Jane Doe, Reuters</AUTHOR>
<BODY>AT&T said it bought a stake in a cocoa trader.</BODY></TEXT>
</REUTERS>
<REUTERS TOPICS="YES" OLDID="5546" NEWID="3">
<DATE>7-APR-1987 08:00:00.00</DATE>
<TOPICS><D>acq</D><D>earn</D></TOPICS><PEOPLE><D>volcker</D></PEOPLE>
<TEXT TYPE="BRIEF"><TITLE>EARNINGS BRIEF</TITLE></TEXT>
</REUTERS>
"#;

fn make_state(max_results_cap: usize, disable_cache: bool) -> AppState {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("reut2-000.sgm");
    std::fs::write(&path, CORPUS).unwrap();
    let store = DocumentStore::load([path], &LoadOptions::default()).unwrap();
    AppState {
        store,
        max_results_cap,
        disable_cache,
    }
}

fn app() -> Router {
    router(make_state(500, false))
}

async fn get(app: Router, uri: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);
    (status, headers, body)
}

async fn get_xml(app: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::ACCEPT, "application/xml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, headers, String::from_utf8(body_bytes.to_vec()).unwrap())
}

fn item_ids(body: &serde_json::Value) -> Vec<i64> {
    body["_items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["reuters_id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn healthz_ok() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn root_lists_children_in_order() {
    let (status, _, body) = get(app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    let hrefs: Vec<&str> = body["_links"]["child"]
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["href"].as_str().unwrap())
        .collect();
    assert_eq!(
        hrefs,
        vec![
            "documents",
            "topics",
            "places",
            "people",
            "orgs",
            "exchanges",
            "authors"
        ]
    );
    assert_eq!(body["_links"]["child"][0]["title"], "documents");
}

#[tokio::test]
async fn documents_first_page_has_meta_and_links() {
    let (status, headers, body) = get(app(), "/documents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=300"
    );
    assert_eq!(
        body["_meta"],
        serde_json::json!({ "page": 1, "max_results": 25, "total": 3 })
    );
    assert_eq!(
        body["_links"],
        serde_json::json!({
            "parent": { "title": "home", "href": "/" },
            "self": { "title": "documents", "href": "documents" }
        })
    );
    assert_eq!(item_ids(&body), vec![1, 2, 3]);

    let first = &body["_items"][0];
    assert_eq!(first["datetime"], "1987-02-26T15:01:01");
    assert_eq!(first["text"]["type"], "NORM");
    assert_eq!(first["text"]["dateline"], "SALVADOR, Feb 26 -");
    assert!(first["text"]["author"].is_null());
}

#[tokio::test]
async fn documents_paginate_with_links() {
    let (_, _, body) = get(app(), "/documents?max_results=2").await;
    assert_eq!(item_ids(&body), vec![1, 2]);
    assert_eq!(
        body["_links"]["next"],
        serde_json::json!({ "title": "next page", "href": "documents?max_results=2&page=2" })
    );
    assert_eq!(
        body["_links"]["last"]["href"],
        "documents?max_results=2&page=2"
    );
    assert!(body["_links"].get("prev").is_none());

    let (_, _, body) = get(app(), "/documents?max_results=2&page=2").await;
    assert_eq!(item_ids(&body), vec![3]);
    assert_eq!(body["_links"]["prev"]["href"], "documents?max_results=2");
    assert!(body["_links"].get("next").is_none());
    assert!(body["_links"].get("last").is_none());
}

#[tokio::test]
async fn documents_filter_and_search() {
    let (_, _, body) = get(app(), "/documents?topic=acq").await;
    assert_eq!(item_ids(&body), vec![2, 3]);

    let (_, _, body) = get(app(), "/documents?topic=acq&person=volcker").await;
    assert_eq!(item_ids(&body), vec![3]);

    let (_, _, body) = get(app(), "/documents?author=Jane%20Doe").await;
    assert_eq!(item_ids(&body), vec![2]);

    let (_, _, body) = get(app(), "/documents?q=COCOA").await;
    assert_eq!(item_ids(&body), vec![1, 2]);
    assert_eq!(body["_meta"]["total"], 2);

    let (_, _, body) = get(app(), "/documents?place=japan").await;
    assert!(item_ids(&body).is_empty());
    assert_eq!(body["_meta"]["total"], 0);
}

#[tokio::test]
async fn documents_reject_invalid_paging() {
    let (status, _, body) = get(app(), "/documents?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("page must be >= 1")
    );

    let (status, _, body) = get(app(), "/documents?max_results=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("max_results")
    );
}

#[tokio::test]
async fn documents_reject_unparsable_arguments_as_json() {
    for (uri, field) in [
        ("/documents?page=abc", "page"),
        ("/documents?max_results=-1", "max_results"),
    ] {
        let (status, headers, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json",
            "{uri}"
        );
        assert!(
            body["error"].as_str().unwrap_or_default().contains(field),
            "{uri}: {body}"
        );
    }
}

#[tokio::test]
async fn max_results_is_capped() {
    let app = router(make_state(2, true));
    let (status, headers, body) = get(app, "/documents?max_results=100").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CACHE_CONTROL).is_none());
    assert_eq!(body["_meta"]["max_results"], 2);
    assert_eq!(item_ids(&body), vec![1, 2]);
}

#[tokio::test]
async fn document_by_id() {
    let (status, _, body) = get(app(), "/documents/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reuters_old_id"], 5545);
    assert_eq!(body["text"]["author"], "Jane Doe");
    assert_eq!(body["text"]["title"], "AT&T BUYS STAKE");
    assert_eq!(body["exchanges"], serde_json::json!(["nyse"]));

    let (status, _, body) = get(app(), "/documents/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("42"));

    let (status, _, _) = get(app(), "/documents/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn facet_endpoints_list_sorted_values() {
    let (status, _, body) = get(app(), "/topics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({
            "_items": [{ "_id": "acq" }, { "_id": "cocoa" }, { "_id": "earn" }],
            "_meta": { "total": 3 }
        })
    );

    let (_, _, body) = get(app(), "/authors").await;
    assert_eq!(body["_items"], serde_json::json!([{ "_id": "Jane Doe" }]));

    let (_, _, body) = get(app(), "/orgs").await;
    assert_eq!(body["_meta"]["total"], 0);

    let (status, _, _) = get(app(), "/companies").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rate_limiter_drops_excess_requests_per_client() {
    let app = app().layer(RateLimiterLayer::new(1, 1));
    let request = |client: Option<&str>| {
        let mut builder = Request::builder().uri("/healthz");
        if let Some(client) = client {
            builder = builder.header("X-Forwarded-For", client);
        }
        builder.body(Body::empty()).unwrap()
    };

    let first = app.clone().oneshot(request(Some("203.0.113.7"))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.clone().oneshot(request(Some("203.0.113.7"))).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let other = app.clone().oneshot(request(Some("198.51.100.1"))).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    for _ in 0..3 {
        let anonymous = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn root_renders_xml_when_accepted() {
    let (status, headers, body) = get_xml(app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/xml; charset=utf-8"
    );
    assert_eq!(
        body,
        concat!(
            r#"<resource><link rel="child" href="documents" title="documents"/>"#,
            r#"<link rel="child" href="topics" title="topics"/>"#,
            r#"<link rel="child" href="places" title="places"/>"#,
            r#"<link rel="child" href="people" title="people"/>"#,
            r#"<link rel="child" href="orgs" title="orgs"/>"#,
            r#"<link rel="child" href="exchanges" title="exchanges"/>"#,
            r#"<link rel="child" href="authors" title="authors"/></resource>"#
        )
    );
}

#[tokio::test]
async fn documents_render_xml_when_accepted() {
    let (status, headers, body) = get_xml(app(), "/documents?max_results=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=300"
    );
    assert!(body.starts_with(concat!(
        r#"<resource href="documents?max_results=1" title="documents">"#,
        r#"<link rel="last" href="documents?max_results=1&amp;page=3" title="last page"/>"#,
        r#"<link rel="next" href="documents?max_results=1&amp;page=2" title="next page"/>"#,
        r#"<link rel="parent" href="/" title="home"/>"#,
        "<_meta><max_results>1</max_results><page>1</page><total>3</total></_meta>",
        r#"<resource href="documents/1" id="1" title="Document">"#,
        "<datetime>1987-02-26T15:01:01</datetime>"
    )));
    assert_eq!(body.matches("<resource ").count(), 2);
    assert!(body.contains("<places>el-salvador</places><places>usa</places>"));
    assert!(!body.contains("<author>"));

    let (status, _, body) = get_xml(app(), "/documents/2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(r#"<resource href="documents/2" id="2" title="Document">"#));
    assert!(body.contains("<title>AT&amp;T BUYS STAKE</title>"));

    let (_, _, body) = get_xml(app(), "/exchanges").await;
    assert_eq!(
        body,
        "<resource><_meta><total>1</total></_meta><resource><_id>nyse</_id></resource></resource>"
    );
}

#[tokio::test]
async fn json_stays_the_default() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::ACCEPT, "application/json, application/xml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
}
