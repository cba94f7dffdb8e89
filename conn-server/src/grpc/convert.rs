use chrono::{DateTime, Utc};
use prost_types::{value::Kind, ListValue, Struct, Timestamp};
use serde_json::{Map, Number, Value};

use conn_connect::ConnectorDefinition;
use conn_slo::{errors, Result};
use conn_storage::{View, Visibility};

use crate::services::connector_resources::ConnectorResourceView;

use super::pb;

const RESOURCES: &str = "connector-resources/";

/// Id of `users/{uid}/connector-resources/{id}` or
/// `connector-resources/{id}`. A name scoped to another user is unknown.
pub fn resource_id<'a>(name: &'a str, owner: &str) -> Result<&'a str> {
    let id = match name.strip_prefix(RESOURCES) {
        Some(id) => id,
        None => match name.split_once("/connector-resources/") {
            Some((scope, id)) if scope.starts_with("users/") => {
                if scope != owner {
                    return Err(errors::not_found(name));
                }
                id
            }
            _ => "",
        },
    };
    if id.is_empty() || id.contains('/') {
        return Err(errors::invalid_argument(&format!(
            "name: expected users/{{uid}}/connector-resources/{{id}}, got {:?}",
            name
        )));
    }
    Ok(id)
}

/// Uid of `connector-resources/{uid}`.
pub fn permalink_uid(permalink: &str) -> Result<&str> {
    permalink
        .strip_prefix(RESOURCES)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            errors::invalid_argument(&format!(
                "permalink: expected connector-resources/{{uid}}, got {:?}",
                permalink
            ))
        })
}

pub fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| errors::invalid_argument(&format!("{}: required", field)))
}

pub fn view(value: i32) -> Result<View> {
    View::from_number(value).ok_or_else(|| {
        errors::invalid_argument(&format!("view: unknown value {}", value))
    })
}

/// `0` means unset.
pub fn visibility(value: i32) -> Result<Option<Visibility>> {
    match Visibility::from_number(value) {
        Some(Visibility::Unspecified) => Ok(None),
        Some(v) => Ok(Some(v)),
        None => Err(errors::invalid_argument(&format!(
            "visibility: unknown value {}",
            value
        ))),
    }
}

pub fn timestamp(time: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

fn to_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(v) => Kind::BoolValue(*v),
        Value::Number(v) => Kind::NumberValue(v.as_f64().unwrap_or_default()),
        Value::String(v) => Kind::StringValue(v.clone()),
        Value::Array(v) => Kind::ListValue(ListValue {
            values: v.iter().map(to_value).collect(),
        }),
        Value::Object(v) => Kind::StructValue(Struct {
            fields: v.iter().map(|(k, v)| (k.clone(), to_value(v))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

/// `None` unless `value` is an object.
pub fn to_struct(value: &Value) -> Option<Struct> {
    match to_value(value).kind {
        Some(Kind::StructValue(v)) => Some(v),
        _ => None,
    }
}

// Whole numbers come back as integers so `"type": "integer"` still holds.
fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        Value::from(v as i64)
    } else {
        Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn from_value(value: &prost_types::Value) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(v)) => Value::Bool(*v),
        Some(Kind::NumberValue(v)) => number(*v),
        Some(Kind::StringValue(v)) => Value::String(v.clone()),
        Some(Kind::ListValue(v)) => {
            Value::Array(v.values.iter().map(from_value).collect())
        }
        Some(Kind::StructValue(v)) => from_struct(v),
    }
}

pub fn from_struct(value: &Struct) -> Value {
    Value::Object(
        value
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), from_value(v)))
            .collect::<Map<String, Value>>(),
    )
}

pub fn definition(definition: ConnectorDefinition) -> pb::ConnectorDefinition {
    pb::ConnectorDefinition {
        name: definition.name(),
        connection_specification: to_struct(
            &definition.connection_specification,
        ),
        uid: definition.uid,
        id: definition.id,
        title: definition.title,
        connector_type: definition.connector_type.number(),
        kind: definition.kind.to_string(),
        tombstone: definition.tombstone,
    }
}

pub fn resource(view: ConnectorResourceView) -> pb::ConnectorResource {
    pb::ConnectorResource {
        configuration: view.configuration.as_ref().and_then(to_struct),
        name: view.name,
        uid: view.uid,
        id: view.id,
        connector_definition_name: view.connector_definition_name,
        connector_type: view.connector_type.number(),
        description: view.description,
        state: view.state.number(),
        tombstone: view.tombstone,
        user: view.user,
        create_time: Some(timestamp(view.create_time)),
        update_time: Some(timestamp(view.update_time)),
        visibility: view.visibility.number(),
        connector_definition: view.connector_definition.map(definition),
    }
}
