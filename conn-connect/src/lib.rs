mod catalog;
mod csv;
mod definition;
mod grpc;
mod http;
mod mysql;
pub mod schema;

use std::{collections::HashMap, fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;

use conn_slo::{errors, Result};

pub use crate::csv::CsvConnector;
pub use catalog::{DefinitionCatalog, MockDefinitionCatalog, StaticCatalog};
pub use definition::{builtin, ConnectorDefinition, Kind};
pub use grpc::GrpcConnector;
pub use http::HttpConnector;
pub use mysql::MysqlConnector;

/// Connector is the behaviour shared by every connector kind. The service
/// never inspects a configuration itself, it hands it to the connector
/// selected by the resource definition.
#[automock]
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> Kind;

    /// Checks that the backing system described by `configuration` can be
    /// reached. An error moves the resource to `STATE_ERROR`.
    async fn probe(&self, configuration: &Value) -> anyhow::Result<()>;

    /// Forwards one batch of task outputs to the backing system.
    async fn deliver(
        &self,
        configuration: &Value,
        inputs: &[Value],
    ) -> anyhow::Result<()>;
}

/// Connector implementations keyed by kind.
#[derive(Clone, Default)]
pub struct Connectors {
    kinds: HashMap<Kind, Arc<dyn Connector>>,
}

impl fmt::Debug for Connectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds.keys()).finish()
    }
}

impl Connectors {
    /// Registers the built-in kinds. CSV output lands under `local_root`.
    pub fn new<P: Into<PathBuf>>(local_root: P) -> anyhow::Result<Self> {
        Ok(Self::default()
            .with(Arc::new(CsvConnector::new(local_root)))
            .with(Arc::new(MysqlConnector))
            .with(Arc::new(HttpConnector::new()?))
            .with(Arc::new(GrpcConnector)))
    }

    pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
        self.kinds.insert(connector.kind(), connector);
        self
    }

    pub fn get(&self, kind: Kind) -> Result<Arc<dyn Connector>> {
        self.kinds.get(&kind).cloned().ok_or_else(|| {
            errors::anyhow(anyhow::anyhow!("no connector for kind {}", kind))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_dispatches_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let connectors = Connectors::new(dir.path()).unwrap();
        for kind in [Kind::Csv, Kind::Mysql, Kind::Http, Kind::Grpc] {
            assert_eq!(connectors.get(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn missing_kind_is_an_error() {
        let mut mock = MockConnector::new();
        mock.expect_kind().return_const(Kind::Http);
        let connectors = Connectors::default().with(Arc::new(mock));
        assert!(connectors.get(Kind::Http).is_ok());
        assert!(connectors.get(Kind::Csv).is_err());
    }
}
