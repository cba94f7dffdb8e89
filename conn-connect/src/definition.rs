use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use conn_storage::ConnectorType;

/// Implementation family a definition dispatches to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Csv,
    Mysql,
    Http,
    Grpc,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Mysql => "mysql",
            Self::Http => "http",
            Self::Grpc => "grpc",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    pub uid: String,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub documentation_url: String,
    pub connector_type: ConnectorType,
    pub kind: Kind,
    #[serde(default)]
    pub tombstone: bool,
    /// JSON schema every resource configuration must satisfy.
    pub connection_specification: Value,
    /// Top level configuration keys masked in responses.
    #[serde(default)]
    pub credential_fields: Vec<String>,
}

impl ConnectorDefinition {
    pub fn name(&self) -> String {
        format!("connector-definitions/{}", self.id)
    }
}

fn directness(
    uid: &str,
    id: &str,
    title: &str,
    connector_type: ConnectorType,
    kind: Kind,
    target: &str,
) -> ConnectorDefinition {
    let pattern = match kind {
        Kind::Http => "^https?://",
        _ => "^\\S+$",
    };
    ConnectorDefinition {
        uid: uid.to_owned(),
        id: id.to_owned(),
        title: title.to_owned(),
        documentation_url: String::new(),
        connector_type,
        kind,
        tombstone: false,
        connection_specification: json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                target: {"type": "string", "pattern": pattern}
            }
        }),
        credential_fields: Vec::new(),
    }
}

/// Definitions shipped with the service.
pub fn builtin() -> Vec<ConnectorDefinition> {
    vec![
        directness(
            "f20a3c02-c70e-4e76-8566-7c13ca11d18d",
            "source-http",
            "HTTP",
            ConnectorType::Source,
            Kind::Http,
            "url",
        ),
        directness(
            "82ca7d29-a35c-4222-b900-8d6878195e7a",
            "source-grpc",
            "gRPC",
            ConnectorType::Source,
            Kind::Grpc,
            "endpoint",
        ),
        directness(
            "909c3278-f7d1-461c-9352-87741bef11d3",
            "destination-http",
            "HTTP",
            ConnectorType::Destination,
            Kind::Http,
            "url",
        ),
        directness(
            "c0e4a82c-9620-4a72-abd1-18586f2acccd",
            "destination-grpc",
            "gRPC",
            ConnectorType::Destination,
            Kind::Grpc,
            "endpoint",
        ),
        ConnectorDefinition {
            uid: "8be1cf83-fde1-477f-a4ad-318d23c9f3c6".to_owned(),
            id: "destination-csv".to_owned(),
            title: "Local CSV".to_owned(),
            documentation_url: String::new(),
            connector_type: ConnectorType::Data,
            kind: Kind::Csv,
            tombstone: false,
            connection_specification: json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "required": ["destination_path"],
                "properties": {
                    "destination_path": {"type": "string", "minLength": 1}
                }
            }),
            credential_fields: Vec::new(),
        },
        ConnectorDefinition {
            uid: "ca81ee7c-3163-4246-af40-094cc31e5e42".to_owned(),
            id: "destination-mysql".to_owned(),
            title: "MySQL".to_owned(),
            documentation_url: String::new(),
            connector_type: ConnectorType::Data,
            kind: Kind::Mysql,
            tombstone: false,
            connection_specification: json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "required": ["host", "database", "username", "password"],
                "properties": {
                    "host": {"type": "string", "minLength": 1},
                    "port": {"type": "integer", "minimum": 1, "maximum": 65535},
                    "database": {"type": "string", "minLength": 1},
                    "username": {"type": "string", "minLength": 1},
                    "password": {"type": "string"},
                    "table": {
                        "type": "string",
                        "pattern": "^[A-Za-z_][A-Za-z0-9_]{0,63}$"
                    }
                }
            }),
            credential_fields: vec!["password".to_owned()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_unique() {
        let definitions = builtin();
        for (i, a) in definitions.iter().enumerate() {
            for b in &definitions[i + 1..] {
                assert_ne!(a.id, b.id);
                assert_ne!(a.uid, b.uid);
            }
        }
    }

    #[test]
    fn definition_from_json() {
        let definition: ConnectorDefinition = serde_json::from_value(json!({
            "uid": "00000000-0000-4000-8000-000000000001",
            "id": "destination-legacy",
            "title": "Legacy",
            "connector_type": "CONNECTOR_TYPE_DESTINATION",
            "kind": "http",
            "tombstone": true,
            "connection_specification": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(definition.kind, Kind::Http);
        assert!(definition.tombstone);
        assert!(definition.credential_fields.is_empty());
        assert_eq!(
            definition.name(),
            "connector-definitions/destination-legacy"
        );
    }
}
