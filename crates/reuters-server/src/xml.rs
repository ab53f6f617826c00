//! XML renderings of API responses for clients that ask for `application/xml`.
//!
//! The layout mirrors the JSON bodies. `_links` entries become `<link>`
//! elements sorted by `rel`, except `self`, which becomes the `href` and
//! `title` of the enclosing `<resource>`. `_meta` is written as a `<_meta>`
//! element and every `_items` entry as a nested `<resource>`. Object keys are
//! written in sorted order, list values repeat their element, and `null`
//! fields are left out.

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Value};
use thiserror::Error;

const RESOURCE: &str = "resource";
const ITEM_TITLE: &str = "Document";
const ITEM_ID_FIELD: &str = "reuters_id";

#[derive(Debug, Error)]
#[error("rendering xml: {0}")]
pub struct XmlError(String);

/// Whether the `Accept` header lists an XML media type before JSON.
pub fn wants_xml(headers: &HeaderMap) -> bool {
    let Some(accept) = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    accept
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .find(|media| matches!(*media, "application/xml" | "text/xml" | "application/json"))
        .is_some_and(|media| media != "application/json")
}

/// An `application/xml` response body.
pub struct Xml(pub String);

impl IntoResponse for Xml {
    fn into_response(self) -> Response {
        (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/xml; charset=utf-8"),
            )],
            self.0,
        )
            .into_response()
    }
}

/// Render an index or collection body. Items of a `collection` carry
/// `href` and `id` attributes built from their `reuters_id`.
pub fn render_resource(body: &Value, collection: Option<&str>) -> Result<String, XmlError> {
    let mut out = XmlWriter::new();
    let links = body.get("_links").and_then(Value::as_object);
    let this = links.and_then(|links| links.get("self"));
    let href = this.and_then(|link| link.get("href")).and_then(Value::as_str);
    let title = this.and_then(|link| link.get("title")).and_then(Value::as_str);
    let mut attributes = Vec::new();
    if let Some(href) = href {
        attributes.push(("href", href));
    }
    if let Some(title) = title {
        attributes.push(("title", title));
    }

    out.open(RESOURCE, &attributes)?;
    if let Some(links) = links {
        for (rel, link) in sorted(links) {
            match link {
                _ if rel == "self" => {}
                Value::Array(all) => {
                    for link in all {
                        out.link(rel, link)?;
                    }
                }
                link => out.link(rel, link)?,
            }
        }
    }
    if let Some(meta) = body.get("_meta") {
        out.value("_meta", meta)?;
    }
    if let Some(items) = body.get("_items").and_then(Value::as_array) {
        for item in items {
            out.item(item, collection)?;
        }
    }
    out.close(RESOURCE)?;
    out.finish()
}

/// Render a single item of `collection`.
pub fn render_item(item: &Value, collection: &str) -> Result<String, XmlError> {
    let mut out = XmlWriter::new();
    out.item(item, Some(collection))?;
    out.finish()
}

fn sorted(map: &Map<String, Value>) -> Vec<(&str, &Value)> {
    let mut entries: Vec<_> = map.iter().map(|(key, value)| (key.as_str(), value)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), XmlError> {
        self.writer
            .write_event(event)
            .map_err(|err| XmlError(err.to_string()))
    }

    fn open(&mut self, tag: &str, attributes: &[(&str, &str)]) -> Result<(), XmlError> {
        let mut start = BytesStart::new(tag);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.write(Event::Start(start))
    }

    fn close(&mut self, tag: &str) -> Result<(), XmlError> {
        self.write(Event::End(BytesEnd::new(tag)))
    }

    fn link(&mut self, rel: &str, link: &Value) -> Result<(), XmlError> {
        let field = |name: &str| link.get(name).and_then(Value::as_str).unwrap_or_default();
        let mut start = BytesStart::new("link");
        start.push_attribute(("rel", rel));
        start.push_attribute(("href", field("href")));
        start.push_attribute(("title", field("title")));
        self.write(Event::Empty(start))
    }

    fn item(&mut self, item: &Value, collection: Option<&str>) -> Result<(), XmlError> {
        let id = item.get(ITEM_ID_FIELD).map(Value::to_string);
        match (collection, id) {
            (Some(collection), Some(id)) => {
                let href = format!("{collection}/{id}");
                self.open(
                    RESOURCE,
                    &[
                        ("href", href.as_str()),
                        ("id", id.as_str()),
                        ("title", ITEM_TITLE),
                    ],
                )?;
            }
            _ => self.open(RESOURCE, &[])?,
        }
        if let Some(fields) = item.as_object() {
            for (key, value) in sorted(fields) {
                self.value(key, value)?;
            }
        }
        self.close(RESOURCE)
    }

    fn value(&mut self, tag: &str, value: &Value) -> Result<(), XmlError> {
        match value {
            Value::Null => Ok(()),
            Value::Array(values) => {
                for value in values {
                    self.value(tag, value)?;
                }
                Ok(())
            }
            Value::Object(fields) => {
                self.open(tag, &[])?;
                for (key, value) in sorted(fields) {
                    self.value(key, value)?;
                }
                self.close(tag)
            }
            Value::String(text) => self.leaf(tag, text),
            other => self.leaf(tag, &other.to_string()),
        }
    }

    fn leaf(&mut self, tag: &str, text: &str) -> Result<(), XmlError> {
        self.open(tag, &[])?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.close(tag)
    }

    fn finish(self) -> Result<String, XmlError> {
        String::from_utf8(self.writer.into_inner()).map_err(|err| XmlError(err.to_string()))
    }
}
