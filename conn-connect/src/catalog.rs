use std::path::Path;

use anyhow::Context;
use mockall::automock;

use conn_slo::{errors, Result};

use crate::definition::{builtin, ConnectorDefinition};

/// Read-only registry of connector definitions.
#[automock]
pub trait DefinitionCatalog: Send + Sync {
    fn get_definition(&self, id: &str) -> Result<ConnectorDefinition>;
    fn get_definition_by_uid(&self, uid: &str) -> Result<ConnectorDefinition>;
    fn list_definitions(&self) -> Vec<ConnectorDefinition>;
}

#[derive(Debug, Clone)]
pub struct StaticCatalog {
    definitions: Vec<ConnectorDefinition>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new(builtin())
    }
}

impl StaticCatalog {
    pub fn new(definitions: Vec<ConnectorDefinition>) -> Self {
        Self { definitions }
    }

    /// Built-in definitions extended by a JSON array file. A file entry
    /// replaces the built-in definition with the same id.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| {
            format!("failed to read definitions from {}", path.display())
        })?;
        let extra: Vec<ConnectorDefinition> = serde_json::from_str(&content)
            .with_context(|| {
                format!("failed to parse definitions in {}", path.display())
            })?;
        let mut catalog = Self::default();
        for definition in extra {
            catalog.definitions.retain(|v| v.id != definition.id);
            catalog.definitions.push(definition);
        }
        Ok(catalog)
    }
}

impl DefinitionCatalog for StaticCatalog {
    fn get_definition(&self, id: &str) -> Result<ConnectorDefinition> {
        self.definitions
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| {
                errors::not_found(&format!("connector definition {}", id))
            })
    }

    fn get_definition_by_uid(&self, uid: &str) -> Result<ConnectorDefinition> {
        self.definitions
            .iter()
            .find(|v| v.uid == uid)
            .cloned()
            .ok_or_else(|| {
                errors::not_found(&format!("connector definition uid {}", uid))
            })
    }

    fn list_definitions(&self) -> Vec<ConnectorDefinition> {
        self.definitions.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use conn_slo::errors::ErrorKind;

    use super::*;
    use crate::definition::Kind;

    #[test]
    fn lookup_by_id_and_uid() {
        let catalog = StaticCatalog::default();
        let csv = catalog.get_definition("destination-csv").unwrap();
        assert_eq!(csv.kind, Kind::Csv);
        assert_eq!(
            catalog.get_definition_by_uid(&csv.uid).unwrap().id,
            "destination-csv"
        );
        assert_eq!(
            catalog.get_definition("destination-nope").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn file_entries_override_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "uid": "8be1cf83-fde1-477f-a4ad-318d23c9f3c6",
                "id": "destination-csv",
                "title": "Local CSV",
                "connector_type": "CONNECTOR_TYPE_DATA",
                "kind": "csv",
                "tombstone": true,
                "connection_specification": {{"type": "object"}}
            }}]"#
        )
        .unwrap();

        let catalog = StaticCatalog::load(file.path()).unwrap();
        assert!(catalog.get_definition("destination-csv").unwrap().tombstone);
        assert_eq!(
            catalog.list_definitions().len(),
            StaticCatalog::default().list_definitions().len()
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        assert!(StaticCatalog::load("/nonexistent/definitions.json").is_err());
    }
}
