use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;

use conn_slo::{errors, Result};

/// Answers which pipelines still reference a connector resource.
#[automock]
#[async_trait]
pub trait OccupancyOracle: Send + Sync {
    /// Ids of the pipelines using the resource `uid`.
    async fn referenced_by(&self, uid: &str) -> Result<Vec<String>>;
}

/// Used when no pipeline backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOracle;

#[async_trait]
impl OccupancyOracle for NoopOracle {
    async fn referenced_by(&self, _uid: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct Pipeline {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListPipelinesResponse {
    #[serde(default)]
    pipelines: Vec<Pipeline>,
}

/// Asks the pipeline backend admin API.
#[derive(Debug, Clone)]
pub struct PipelineOracle {
    client: reqwest::Client,
    base_url: String,
}

impl PipelineOracle {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

pub fn recipe_filter(uid: &str) -> String {
    format!(
        "recipe.components.resource_name:\"connector-resources/{}\"",
        uid
    )
}

#[async_trait]
impl OccupancyOracle for PipelineOracle {
    #[tracing::instrument(skip(self))]
    async fn referenced_by(&self, uid: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/v1alpha/admin/pipelines", self.base_url))
            .query(&[
                ("filter", recipe_filter(uid)),
                ("view", "VIEW_BASIC".to_owned()),
            ])
            .send()
            .await
            .map_err(errors::any)?
            .error_for_status()
            .map_err(errors::any)?
            .json::<ListPipelinesResponse>()
            .await
            .map_err(errors::any)?;
        Ok(response.pipelines.into_iter().map(|v| v.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_reports_nothing() {
        assert!(NoopOracle.referenced_by("u").await.unwrap().is_empty());
    }

    #[test]
    fn filter_targets_the_permalink() {
        assert_eq!(
            recipe_filter("5b1f"),
            r#"recipe.components.resource_name:"connector-resources/5b1f""#
        );
    }

    #[test]
    fn base_url_is_normalized() {
        let oracle = PipelineOracle::new("http://pipeline:8081/").unwrap();
        assert_eq!(oracle.base_url, "http://pipeline:8081");
    }

    #[test]
    fn missing_pipelines_field_means_none() {
        let response: ListPipelinesResponse =
            serde_json::from_str(r#"{"total_size": 0}"#).unwrap();
        assert!(response.pipelines.is_empty());
    }
}
