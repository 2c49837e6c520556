//! The GraphQL response envelope (core spec §7): `{ "data": ..., "errors": [...] }`.
//!
//! Built as plain `serde_json_bytes::Value` trees rather than a `Serialize`
//! impl, matching how the rest of this crate assembles JSON by hand
//! ([`crate::step::key_projection`]).

use serde_json_bytes::{ByteString, Map, Value};

use crate::error::{PathSegment, SingleGraphQLError};

/// The top-level result of running one operation to completion.
#[derive(Debug, Clone)]
pub struct GraphQLResponse {
    pub data: Option<Value>,
    pub errors: Vec<SingleGraphQLError>,
}

impl GraphQLResponse {
    pub fn new(data: Option<Value>, errors: Vec<SingleGraphQLError>) -> Self {
        Self { data, errors }
    }

    /// Renders the standard `{ data, errors }` envelope. `data` is omitted
    /// entirely when planning failed before any value was produced; `errors`
    /// is omitted when empty, per the GraphQL spec's response shape.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        if let Some(data) = &self.data {
            root.insert(ByteString::from("data"), data.clone());
        } else {
            root.insert(ByteString::from("data"), Value::Null);
        }
        if !self.errors.is_empty() {
            let errors = self.errors.iter().map(error_to_value).collect();
            root.insert(ByteString::from("errors"), Value::Array(errors));
        }
        Value::Object(root)
    }
}

fn error_to_value(error: &SingleGraphQLError) -> Value {
    let mut entry = Map::new();
    entry.insert(ByteString::from("message"), Value::String(error.message.clone().into()));
    if !error.path.is_empty() {
        let path = error.path.iter().map(path_segment_to_value).collect();
        entry.insert(ByteString::from("path"), Value::Array(path));
    }
    if !error.locations.is_empty() {
        let locations = error
            .locations
            .iter()
            .map(|loc| {
                let mut m = Map::new();
                m.insert(ByteString::from("line"), Value::from(loc.line as u64));
                m.insert(ByteString::from("column"), Value::from(loc.column as u64));
                Value::Object(m)
            })
            .collect();
        entry.insert(ByteString::from("locations"), Value::Array(locations));
    }
    if !error.extensions.is_empty() {
        entry.insert(ByteString::from("extensions"), Value::Object(error.extensions.clone()));
    }
    Value::Object(entry)
}

fn path_segment_to_value(segment: &PathSegment) -> Value {
    match segment {
        PathSegment::Field(name) => Value::String(name.clone().into()),
        PathSegment::Index(i) => Value::from(*i as u64),
    }
}
