use std::{ops::Deref, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::MySqlPool;
use tracing::info;

use conn_connect::{Connectors, DefinitionCatalog, StaticCatalog};
use conn_slo::errors;
use conn_storage::{ConnectorResourceImpl, ConnectorResourceStore, MemoryStore};

use crate::{
    services::{
        occupancy::{NoopOracle, OccupancyOracle, PipelineOracle},
        state::StateMachine,
    },
    AppConfig,
};

pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn ConnectorResourceStore>,
    pub catalog: Arc<dyn DefinitionCatalog>,
    pub connectors: Connectors,
    pub oracle: Arc<dyn OccupancyOracle>,
    pub machine: StateMachine,
}

impl App {
    /// Resources live in memory when no pool is given.
    pub fn new(pool: Option<MySqlPool>, config: AppConfig) -> Result<Self> {
        info!("initializing utility services...");

        let store: Arc<dyn ConnectorResourceStore> = match pool {
            Some(pool) => Arc::new(ConnectorResourceImpl::new(pool)),
            None => {
                info!("no database configured, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        let catalog: Arc<dyn DefinitionCatalog> =
            match &config.definitions_path {
                Some(path) => Arc::new(StaticCatalog::load(path)?),
                None => Arc::new(StaticCatalog::default()),
            };
        let oracle: Arc<dyn OccupancyOracle> =
            match &config.pipeline_backend_url {
                Some(url) => Arc::new(
                    PipelineOracle::new(url)
                        .context("could not build the pipeline client")?,
                ),
                None => Arc::new(NoopOracle),
            };
        let connectors = Connectors::new(&config.local_root)?;

        info!("feature services successfully initialized!");
        Ok(Self::with_parts(config, store, catalog, connectors, oracle))
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn ConnectorResourceStore>,
        catalog: Arc<dyn DefinitionCatalog>,
        connectors: Connectors,
        oracle: Arc<dyn OccupancyOracle>,
    ) -> Self {
        let machine = StateMachine::new(
            store.clone(),
            connectors.clone(),
            config.probe_concurrency,
        );
        Self {
            config,
            store,
            catalog,
            connectors,
            oracle,
            machine,
        }
    }
}

#[derive(Clone)]
pub struct AppState(pub Arc<App>);

// deref so you can still access the inner fields easily
impl Deref for AppState {
    type Target = App;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AppState
where
    Self: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = errors::WithBacktrace;

    async fn from_request_parts(
        _: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_ref(state))
    }
}
