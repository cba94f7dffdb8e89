use std::{
    fs::OpenOptions,
    path::{Component, Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde_json::Value;

use crate::{definition::Kind, Connector};

const LOCAL_PREFIX: &str = "/local";
const OUTPUT_FILE: &str = "output.csv";

/// Writes outputs as `index,data` rows into a directory under the local root.
#[derive(Debug, Clone)]
pub struct CsvConnector {
    local_root: PathBuf,
}

impl CsvConnector {
    pub fn new<P: Into<PathBuf>>(local_root: P) -> Self {
        Self {
            local_root: local_root.into(),
        }
    }

    /// Maps `destination_path` (`/local/...`) under the local root.
    fn destination(&self, configuration: &Value) -> anyhow::Result<PathBuf> {
        let path = configuration
            .get("destination_path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("destination_path is required"))?;
        let relative = path
            .strip_prefix(LOCAL_PREFIX)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| {
                anyhow!("destination_path must start with {}", LOCAL_PREFIX)
            })?;
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("destination_path must not leave {}", LOCAL_PREFIX);
        }
        Ok(self.local_root.join(relative))
    }
}

fn append_rows(file: &Path, inputs: &[Value]) -> anyhow::Result<()> {
    let exists = file.exists();
    let handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(handle);
    if !exists {
        writer.write_record(["index", "data"])?;
    }
    for (index, input) in inputs.iter().enumerate() {
        writer.write_record([index.to_string(), serde_json::to_string(input)?])?;
    }
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl Connector for CsvConnector {
    fn kind(&self) -> Kind {
        Kind::Csv
    }

    async fn probe(&self, configuration: &Value) -> anyhow::Result<()> {
        let dir = self.destination(configuration)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let metadata = tokio::fs::metadata(&dir).await?;
        if !metadata.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
        Ok(())
    }

    async fn deliver(
        &self,
        configuration: &Value,
        inputs: &[Value],
    ) -> anyhow::Result<()> {
        let dir = self.destination(configuration)?;
        tokio::fs::create_dir_all(&dir).await?;
        let file = dir.join(OUTPUT_FILE);
        let inputs = inputs.to_vec();
        tokio::task::spawn_blocking(move || append_rows(&file, &inputs))
            .await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn destination_stays_under_root() {
        let connector = CsvConnector::new("/srv/local");
        assert_eq!(
            connector
                .destination(&json!({"destination_path": "/local/test"}))
                .unwrap(),
            PathBuf::from("/srv/local/test")
        );
        assert_eq!(
            connector
                .destination(&json!({"destination_path": "/local"}))
                .unwrap(),
            PathBuf::from("/srv/local")
        );
        for path in ["/tmp", "/localhost", "/local/../etc", "relative"] {
            assert!(
                connector
                    .destination(&json!({"destination_path": path}))
                    .is_err(),
                "{}",
                path
            );
        }
        assert!(connector.destination(&json!({})).is_err());
    }

    #[tokio::test]
    async fn probe_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let connector = CsvConnector::new(root.path());
        connector
            .probe(&json!({"destination_path": "/local/a/b"}))
            .await
            .unwrap();
        assert!(root.path().join("a/b").is_dir());
    }

    #[tokio::test]
    async fn probe_outside_local_fails() {
        let root = tempfile::tempdir().unwrap();
        let connector = CsvConnector::new(root.path());
        let err = connector
            .probe(&json!({"destination_path": "/tmp"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(LOCAL_PREFIX));
    }

    #[tokio::test]
    async fn deliver_appends_rows() {
        let root = tempfile::tempdir().unwrap();
        let connector = CsvConnector::new(root.path());
        let configuration = json!({"destination_path": "/local/out"});
        connector
            .deliver(&configuration, &[json!({"category": "dog"})])
            .await
            .unwrap();
        connector
            .deliver(&configuration, &[json!({"category": "cat"})])
            .await
            .unwrap();

        let mut reader =
            csv::Reader::from_path(root.path().join("out").join(OUTPUT_FILE))
                .unwrap();
        assert_eq!(reader.headers().unwrap(), vec!["index", "data"]);
        let rows: Vec<csv::StringRecord> =
            reader.records().map(|v| v.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][1], r#"{"category":"cat"}"#);
    }
}
