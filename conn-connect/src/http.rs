use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{definition::Kind, Connector};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn target(configuration: &Value) -> Option<&str> {
    configuration
        .get("url")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

/// Directness connector. Without a `url` it has nothing to reach and always
/// connects.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn kind(&self) -> Kind {
        Kind::Http
    }

    async fn probe(&self, configuration: &Value) -> anyhow::Result<()> {
        let Some(url) = target(configuration) else {
            return Ok(());
        };
        let response = self.client.get(url).send().await?;
        if response.status().is_server_error() {
            bail!("{} answered {}", url, response.status());
        }
        Ok(())
    }

    async fn deliver(
        &self,
        configuration: &Value,
        inputs: &[Value],
    ) -> anyhow::Result<()> {
        let Some(url) = target(configuration) else {
            return Ok(());
        };
        self.client
            .post(url)
            .json(&json!({ "inputs": inputs }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_url_is_reachable() {
        let connector = HttpConnector::new().unwrap();
        connector.probe(&json!({})).await.unwrap();
        connector.probe(&json!({"url": ""})).await.unwrap();
        connector.deliver(&json!({}), &[json!({})]).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_url_fails_probe() {
        let connector = HttpConnector::new().unwrap();
        assert!(connector
            .probe(&json!({"url": "not a url"}))
            .await
            .is_err());
    }
}
