use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use reuters_types::{DocumentRecord, Facet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::store::{DocumentStore, QueryParams};
use crate::xml::{self, Xml};

pub const DEFAULT_MAX_RESULTS: usize = 25;
const DOCUMENTS: &str = "documents";

/// Resources listed by `GET /`, in order.
const CHILDREN: [&str; 7] = [
    DOCUMENTS,
    "topics",
    "places",
    "people",
    "orgs",
    "exchanges",
    "authors",
];

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub max_results_cap: usize,
    pub disable_cache: bool,
}

#[derive(Deserialize)]
pub struct DocumentsQuery {
    pub page: Option<usize>,
    pub max_results: Option<usize>,
    pub topic: Option<String>,
    pub place: Option<String>,
    pub person: Option<String>,
    pub org: Option<String>,
    pub exchange: Option<String>,
    pub author: Option<String>,
    pub q: Option<String>,
}

impl DocumentsQuery {
    fn filters(&self) -> Vec<(Facet, &str)> {
        [
            (Facet::Topics, &self.topic),
            (Facet::Places, &self.place),
            (Facet::People, &self.person),
            (Facet::Orgs, &self.org),
            (Facet::Exchanges, &self.exchange),
            (Facet::Authors, &self.author),
        ]
        .into_iter()
        .filter_map(|(facet, value)| value.as_deref().map(|value| (facet, value)))
        .collect()
    }
}

#[derive(Serialize)]
struct Link {
    title: String,
    href: String,
}

impl Link {
    fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

#[derive(Serialize)]
struct RootLinks {
    child: Vec<Link>,
}

#[derive(Serialize)]
struct RootResponse {
    #[serde(rename = "_links")]
    links: RootLinks,
}

#[derive(Serialize)]
struct PageMeta {
    page: usize,
    max_results: usize,
    total: usize,
}

#[derive(Serialize)]
struct PageLinks {
    parent: Link,
    #[serde(rename = "self")]
    this: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last: Option<Link>,
}

#[derive(Serialize)]
struct DocumentsResponse<'a> {
    #[serde(rename = "_items")]
    items: Vec<&'a DocumentRecord>,
    #[serde(rename = "_meta")]
    meta: PageMeta,
    #[serde(rename = "_links")]
    links: PageLinks,
}

#[derive(Serialize)]
struct FacetItem<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Serialize)]
struct FacetMeta {
    total: usize,
}

#[derive(Serialize)]
struct FacetResponse<'a> {
    #[serde(rename = "_items")]
    items: Vec<FacetItem<'a>>,
    #[serde(rename = "_meta")]
    meta: FacetMeta,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/documents", get(documents))
        .route("/documents/{reuters_id}", get(document))
        .route("/{facet}", get(facet))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn root(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let child = CHILDREN
        .iter()
        .map(|name| Link::new(*name, *name))
        .collect();
    let body = RootResponse {
        links: RootLinks { child },
    };
    respond(&state, &headers, body, |value| xml::render_resource(value, None))
}

async fn documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DocumentsQuery>, QueryRejection>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, ApiError> {
    let Query(params) =
        query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::bad_request("page must be >= 1"));
    }
    let mut max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    if max_results == 0 {
        return Err(ApiError::bad_request("max_results must be >= 1"));
    }
    if max_results > state.max_results_cap {
        max_results = state.max_results_cap;
    }

    let filters = params.filters();
    let result = state.store.query(QueryParams {
        filters: &filters,
        text: params.q.as_deref(),
        page,
        page_size: max_results,
    });

    let hrefs = PageHrefs::new(raw_query.as_deref());
    let last_page = result.total.div_ceil(max_results).max(1);
    let links = PageLinks {
        parent: Link::new("home", "/"),
        this: Link::new(DOCUMENTS, hrefs.page(page)),
        next: result
            .has_more
            .then(|| Link::new("next page", hrefs.page(page + 1))),
        prev: (page > 1).then(|| Link::new("previous page", hrefs.page(page - 1))),
        last: (page < last_page).then(|| Link::new("last page", hrefs.page(last_page))),
    };

    let response = DocumentsResponse {
        items: result.items,
        meta: PageMeta {
            page,
            max_results,
            total: result.total,
        },
        links,
    };
    respond(&state, &headers, response, |value| {
        xml::render_resource(value, Some(DOCUMENTS))
    })
}

async fn document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let reuters_id: i64 = raw_id
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("reuters_id must be an integer"))?;
    let doc = state
        .store
        .get(reuters_id)
        .ok_or_else(|| ApiError::NotFound(format!("document {reuters_id} not found")))?;
    respond(&state, &headers, doc, |value| xml::render_item(value, DOCUMENTS))
}

async fn facet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let facet = Facet::from_name(&name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown resource {name:?}")))?;
    let values = state.store.facet_values(facet);
    let response = FacetResponse {
        items: values.iter().map(|id| FacetItem { id }).collect(),
        meta: FacetMeta {
            total: values.len(),
        },
    };
    respond(&state, &headers, response, |value| {
        xml::render_resource(value, None)
    })
}

/// JSON by default, XML when the `Accept` header prefers it.
fn respond<T: Serialize>(
    state: &AppState,
    headers: &HeaderMap,
    body: T,
    render_xml: impl FnOnce(&serde_json::Value) -> Result<String, xml::XmlError>,
) -> Result<Response, ApiError> {
    if !xml::wants_xml(headers) {
        return Ok(cached(state, Json(body)));
    }
    let rendered = serde_json::to_value(&body)
        .map_err(|err| err.to_string())
        .and_then(|value| render_xml(&value).map_err(|err| err.to_string()))
        .map_err(|err| {
            error!("{err}");
            ApiError::Internal
        })?;
    Ok(cached(state, Xml(rendered)))
}

fn cached(state: &AppState, body: impl IntoResponse) -> Response {
    if state.disable_cache {
        return body.into_response();
    }
    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=300"),
        )],
        body,
    )
        .into_response()
}

/// Builds `documents?...` links that keep every query argument except `page`.
struct PageHrefs {
    retained: Vec<String>,
}

impl PageHrefs {
    fn new(raw_query: Option<&str>) -> Self {
        let retained = raw_query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| pair.split('=').next() != Some("page"))
            .map(str::to_string)
            .collect();
        Self { retained }
    }

    fn page(&self, page: usize) -> String {
        let mut args = self.retained.clone();
        if page > 1 {
            args.push(format!("page={page}"));
        }
        if args.is_empty() {
            DOCUMENTS.to_string()
        } else {
            format!("{DOCUMENTS}?{}", args.join("&"))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
