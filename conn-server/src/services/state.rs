use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, error, info, warn};

use conn_connect::{Connector, Connectors, Kind};
use conn_slo::{errors, Result};
use conn_storage::{ConnectorResource, ConnectorResourceStore, State};

use crate::var::CONNECTOR_PROBES_TOTAL;

/// Per resource counter of state transitions. A probe result is written only
/// while the counter still holds the value it was dispatched with.
type Epoch = Arc<AsyncMutex<u64>>;

pub struct StateMachine {
    store: Arc<dyn ConnectorResourceStore>,
    connectors: Connectors,
    epochs: Mutex<HashMap<String, Epoch>>,
    permits: Arc<Semaphore>,
}

impl StateMachine {
    pub fn new(
        store: Arc<dyn ConnectorResourceStore>,
        connectors: Connectors,
        probe_concurrency: usize,
    ) -> Self {
        Self {
            store,
            connectors,
            epochs: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(probe_concurrency.max(1))),
        }
    }

    fn epoch(&self, uid: &str) -> Result<Epoch> {
        let mut epochs = self.epochs.lock().map_err(errors::any)?;
        Ok(epochs.entry(uid.to_owned()).or_default().clone())
    }

    /// Holds the per resource lock. Writes that read the stored resource
    /// first must re-read it while the guard is alive.
    pub async fn lock(&self, uid: &str) -> Result<OwnedMutexGuard<u64>> {
        Ok(self.epoch(uid)?.lock_owned().await)
    }

    /// Drops the lock entry of a deleted resource.
    pub fn forget(&self, uid: &str) {
        if let Ok(mut epochs) = self.epochs.lock() {
            epochs.remove(uid);
        }
    }

    /// Starts an asynchronous probe. Returns once the probe is queued.
    #[tracing::instrument(skip_all, fields(uid = %resource.uid))]
    pub async fn connect(
        &self,
        resource: &ConnectorResource,
        kind: Kind,
    ) -> Result<()> {
        let connector = self.connectors.get(kind)?;
        let epoch = self.epoch(&resource.uid)?;
        let mut guard = epoch.lock().await;
        let current = self
            .store
            .get_connector_resource_by_uid(&resource.uid, None)
            .await?;
        if current.state == State::Connected {
            debug!("already connected");
            return Ok(());
        }
        *guard += 1;
        let dispatched = *guard;
        drop(guard);

        let store = self.store.clone();
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(uid = %current.uid, "probe pool closed: {}", err);
                    return;
                }
            };
            let state =
                probe(connector.as_ref(), &current.configuration).await;
            if let Err(err) =
                record(store.as_ref(), &epoch, dispatched, &current.uid, state)
                    .await
            {
                warn!(uid = %current.uid, "failed to record probe: {}", err);
            }
        });
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self, uid: &str) -> Result<()> {
        let epoch = self.epoch(uid)?;
        let mut guard = epoch.lock().await;
        *guard += 1;
        self.store
            .update_connector_resource_state(uid, State::Disconnected)
            .await?;
        info!("disconnected");
        Ok(())
    }

    /// Probes inline and records the outcome like a connect would.
    #[tracing::instrument(skip_all, fields(uid = %resource.uid))]
    pub async fn test(
        &self,
        resource: &ConnectorResource,
        kind: Kind,
    ) -> Result<State> {
        let connector = self.connectors.get(kind)?;
        let epoch = self.epoch(&resource.uid)?;
        let dispatched = {
            let mut guard = epoch.lock().await;
            *guard += 1;
            *guard
        };
        let _permit = self.permits.acquire().await.map_err(errors::any)?;
        let state = probe(connector.as_ref(), &resource.configuration).await;
        record(
            self.store.as_ref(),
            &epoch,
            dispatched,
            &resource.uid,
            state,
        )
        .await?;
        Ok(state)
    }
}

async fn probe(connector: &dyn Connector, configuration: &Value) -> State {
    let state = match connector.probe(configuration).await {
        Ok(()) => State::Connected,
        Err(err) => {
            warn!(kind = %connector.kind(), "probe failed: {:#}", err);
            State::Error
        }
    };
    CONNECTOR_PROBES_TOTAL
        .with_label_values(&[connector.kind().as_str(), state.as_str()])
        .inc();
    state
}

async fn record(
    store: &dyn ConnectorResourceStore,
    epoch: &AsyncMutex<u64>,
    dispatched: u64,
    uid: &str,
    state: State,
) -> Result<()> {
    let guard = epoch.lock().await;
    if *guard != dispatched {
        debug!(uid, %state, "stale probe result dropped");
        return Ok(());
    }
    store.update_connector_resource_state(uid, state).await?;
    info!(uid, %state, "probe finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::Notify;

    use conn_connect::MockConnector;
    use conn_storage::{ConnectorType, MemoryStore, Visibility};

    use super::*;

    fn resource(uid: &str) -> ConnectorResource {
        let now = Utc::now();
        ConnectorResource {
            uid: uid.to_owned(),
            id: "t1".to_owned(),
            owner: "users/a".to_owned(),
            connector_definition_id: "destination-http".to_owned(),
            connector_type: ConnectorType::Destination,
            description: String::new(),
            configuration: json!({}),
            state: State::Unspecified,
            tombstone: false,
            visibility: Visibility::Private,
            create_time: now,
            update_time: now,
        }
    }

    async fn seeded(uid: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create_connector_resource(&resource(uid)).await.unwrap();
        store
    }

    fn mock(result: bool) -> MockConnector {
        let mut connector = MockConnector::new();
        connector.expect_kind().return_const(Kind::Http);
        connector.expect_probe().returning(move |_| {
            if result {
                Ok(())
            } else {
                Err(anyhow::anyhow!("unreachable"))
            }
        });
        connector
    }

    async fn wait_for(store: &MemoryStore, uid: &str, state: State) {
        for _ in 0..100 {
            let current = store
                .get_connector_resource_by_uid(uid, None)
                .await
                .unwrap();
            if current.state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never reached {}", uid, state);
    }

    #[tokio::test]
    async fn connect_reaches_terminal_state() {
        for (ok, expected) in [(true, State::Connected), (false, State::Error)]
        {
            let store = seeded("u1").await;
            let machine = StateMachine::new(
                store.clone(),
                Connectors::default().with(Arc::new(mock(ok))),
                2,
            );
            machine.connect(&resource("u1"), Kind::Http).await.unwrap();
            wait_for(&store, "u1", expected).await;
        }
    }

    #[tokio::test]
    async fn reconnect_after_disconnect() {
        let store = seeded("u1").await;
        let machine = StateMachine::new(
            store.clone(),
            Connectors::default().with(Arc::new(mock(true))),
            2,
        );
        machine.connect(&resource("u1"), Kind::Http).await.unwrap();
        wait_for(&store, "u1", State::Connected).await;
        machine.disconnect("u1").await.unwrap();
        wait_for(&store, "u1", State::Disconnected).await;
        machine.connect(&resource("u1"), Kind::Http).await.unwrap();
        wait_for(&store, "u1", State::Connected).await;
    }

    #[tokio::test]
    async fn lock_excludes_transitions() {
        let store = seeded("u1").await;
        let machine = Arc::new(StateMachine::new(
            store.clone(),
            Connectors::default().with(Arc::new(mock(true))),
            2,
        ));
        let guard = machine.lock("u1").await.unwrap();
        let task = tokio::spawn({
            let machine = machine.clone();
            async move { machine.disconnect("u1").await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!task.is_finished());
        assert_eq!(
            store
                .get_connector_resource_by_uid("u1", None)
                .await
                .unwrap()
                .state,
            State::Unspecified
        );

        drop(guard);
        task.await.unwrap().unwrap();
        wait_for(&store, "u1", State::Disconnected).await;
    }

    #[tokio::test]
    async fn connect_when_connected_does_not_probe() {
        let store = seeded("u1").await;
        store
            .update_connector_resource_state("u1", State::Connected)
            .await
            .unwrap();
        let mut connector = MockConnector::new();
        connector.expect_kind().return_const(Kind::Http);
        connector.expect_probe().never();
        let machine = StateMachine::new(
            store.clone(),
            Connectors::default().with(Arc::new(connector)),
            2,
        );
        machine.connect(&resource("u1"), Kind::Http).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    /// Probe that blocks until released.
    struct Gate(Arc<Notify>);

    #[async_trait]
    impl Connector for Gate {
        fn kind(&self) -> Kind {
            Kind::Grpc
        }

        async fn probe(&self, _configuration: &Value) -> anyhow::Result<()> {
            self.0.notified().await;
            Ok(())
        }

        async fn deliver(
            &self,
            _configuration: &Value,
            _inputs: &[Value],
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn disconnect_beats_an_inflight_probe() {
        let store = seeded("u1").await;
        let gate = Arc::new(Notify::new());
        let machine = StateMachine::new(
            store.clone(),
            Connectors::default().with(Arc::new(Gate(gate.clone()))),
            2,
        );
        machine.connect(&resource("u1"), Kind::Grpc).await.unwrap();
        machine.disconnect("u1").await.unwrap();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let current = store
            .get_connector_resource_by_uid("u1", None)
            .await
            .unwrap();
        assert_eq!(current.state, State::Disconnected);
    }

    #[tokio::test]
    async fn test_records_and_returns_state() {
        let store = seeded("u1").await;
        let machine = StateMachine::new(
            store.clone(),
            Connectors::default().with(Arc::new(mock(false))),
            1,
        );
        let state = machine.test(&resource("u1"), Kind::Http).await.unwrap();
        assert_eq!(state, State::Error);
        wait_for(&store, "u1", State::Error).await;
    }

    #[tokio::test]
    async fn disconnect_unknown_resource_fails() {
        let machine = StateMachine::new(
            Arc::new(MemoryStore::new()),
            Connectors::default(),
            1,
        );
        assert!(machine.disconnect("missing").await.is_err());
    }
}
