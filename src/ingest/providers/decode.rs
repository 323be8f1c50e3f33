// src/ingest/providers/decode.rs
//! Body decoders for the status feed: XML timelines and JSON search results.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::DataFetchError;
use crate::ingest::types::Item;

pub trait PayloadDecoder: Send + Sync {
    fn decode_list(&self, body: &str) -> Result<Vec<Item>, DataFetchError>;
}

struct OpenElement {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn new(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            children: Map::new(),
            text: String::new(),
        }
    }

    /// Leaf elements become strings (or null when empty); others become objects.
    fn into_value(self) -> (String, Value) {
        let value = if !self.children.is_empty() {
            Value::Object(self.children)
        } else if self.text.is_empty() {
            Value::Null
        } else {
            Value::String(self.text)
        };
        (self.name, value)
    }
}

fn attach(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        None => {
            children.insert(name, value);
        }
        Some(Value::Array(list)) => list.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn xml_error(e: impl Into<crate::error::BoxError>) -> DataFetchError {
    DataFetchError::with_source("parsing status xml", e)
}

/// Whole document as JSON. Every element is kept; attributes are not.
/// Repeated siblings collapse into an array.
fn xml_document(body: &str) -> Result<Value, DataFetchError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<Value> = None;
    loop {
        let closed = match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                stack.push(OpenElement::new(e.local_name().as_ref()));
                None
            }
            Event::Empty(e) => Some(OpenElement::new(e.local_name().as_ref()).into_value()),
            Event::End(_) => match stack.pop() {
                Some(open) => Some(open.into_value()),
                None => return Err(DataFetchError::new("unbalanced status xml")),
            },
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(xml_error)?);
                }
                None
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };
        if let Some((name, value)) = closed {
            match stack.last_mut() {
                Some(parent) => attach(&mut parent.children, name, value),
                None => root = Some(value),
            }
        }
    }
    if !stack.is_empty() {
        return Err(DataFetchError::new("truncated status xml"));
    }
    root.ok_or_else(|| DataFetchError::new("status xml has no root element"))
}

fn status_item(status: Value) -> Result<Item, DataFetchError> {
    let id = status
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if id.is_empty() {
        return Err(DataFetchError::new("status without id"));
    }
    Ok(Item::new(id, status))
}

/// `<statuses><status><id>…</id>…</status>…</statuses>`
///
/// The payload is the whole `<status>` element, including elements not named here.
pub struct XmlStatusDecoder;

impl XmlStatusDecoder {
    /// A single `<status>` document, as returned by update/delete.
    pub fn decode_one(body: &str) -> Result<Item, DataFetchError> {
        status_item(xml_document(body)?)
    }
}

impl PayloadDecoder for XmlStatusDecoder {
    fn decode_list(&self, body: &str) -> Result<Vec<Item>, DataFetchError> {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let statuses = match xml_document(body)? {
            Value::Object(mut root) => root.remove("status").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        match statuses {
            Value::Null => Ok(Vec::new()),
            Value::Array(list) => list.into_iter().map(status_item).collect(),
            one => Ok(vec![status_item(one)?]),
        }
    }
}

/// `{"results": [{"id_str": "…", …}, …]}`
pub struct JsonResultsDecoder;

impl PayloadDecoder for JsonResultsDecoder {
    fn decode_list(&self, body: &str) -> Result<Vec<Item>, DataFetchError> {
        let root: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| DataFetchError::with_source("parsing search json", e))?;
        let Some(results) = root.get("results").and_then(|r| r.as_array()) else {
            return Err(DataFetchError::new("search response has no `results` array"));
        };

        results
            .iter()
            .map(|r| {
                let id = r
                    .get("id_str")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| DataFetchError::new("search result without `id_str`"))?;
                Ok(Item::new(id, r.clone()))
            })
            .collect()
    }
}
