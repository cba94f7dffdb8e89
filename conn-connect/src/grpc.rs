use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tonic::transport::Endpoint;

use crate::{definition::Kind, Connector};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Directness connector for gRPC peers. Delivery is a pass-through, the
/// pipeline talks to the peer itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

fn endpoint(configuration: &Value) -> anyhow::Result<Option<Endpoint>> {
    let Some(target) = configuration
        .get("endpoint")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };
    let uri = if target.contains("://") {
        target.to_owned()
    } else {
        format!("http://{}", target)
    };
    let endpoint = Endpoint::from_shared(uri)
        .with_context(|| format!("invalid endpoint {}", target))?
        .connect_timeout(CONNECT_TIMEOUT);
    Ok(Some(endpoint))
}

#[async_trait]
impl Connector for GrpcConnector {
    fn kind(&self) -> Kind {
        Kind::Grpc
    }

    async fn probe(&self, configuration: &Value) -> anyhow::Result<()> {
        if let Some(endpoint) = endpoint(configuration)? {
            endpoint
                .connect()
                .await
                .with_context(|| format!("failed to reach {}", endpoint.uri()))?;
        }
        Ok(())
    }

    async fn deliver(
        &self,
        configuration: &Value,
        _inputs: &[Value],
    ) -> anyhow::Result<()> {
        endpoint(configuration)?;
        Ok(())
    }
}
