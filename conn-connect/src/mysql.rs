use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlConnection},
    ConnectOptions, Connection,
};

use conn_slo::regexp::is_sql_identifier;

use crate::{definition::Kind, Connector};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TABLE: &str = "connector_outputs";

fn default_port() -> u16 {
    3306
}

#[derive(Debug, Deserialize)]
struct Settings {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    database: String,
    username: String,
    #[serde(default)]
    password: String,
    table: Option<String>,
}

impl Settings {
    fn parse(configuration: &Value) -> anyhow::Result<Self> {
        Settings::deserialize(configuration)
            .context("invalid mysql configuration")
    }

    fn table(&self) -> anyhow::Result<&str> {
        let table = self.table.as_deref().unwrap_or(DEFAULT_TABLE);
        if !is_sql_identifier(table) {
            bail!("invalid table name {}", table);
        }
        Ok(table)
    }

    async fn connect(&self) -> anyhow::Result<MySqlConnection> {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password);
        tokio::time::timeout(CONNECT_TIMEOUT, options.connect())
            .await
            .with_context(|| {
                format!("timed out connecting to {}:{}", self.host, self.port)
            })?
            .with_context(|| {
                format!("failed to connect to {}:{}", self.host, self.port)
            })
    }
}

/// Inserts each output as a JSON row into a MySQL table.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

#[async_trait]
impl Connector for MysqlConnector {
    fn kind(&self) -> Kind {
        Kind::Mysql
    }

    async fn probe(&self, configuration: &Value) -> anyhow::Result<()> {
        let settings = Settings::parse(configuration)?;
        let mut conn = settings.connect().await?;
        sqlx::query("SELECT 1").execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn deliver(
        &self,
        configuration: &Value,
        inputs: &[Value],
    ) -> anyhow::Result<()> {
        let settings = Settings::parse(configuration)?;
        let table = settings.table()?;
        let mut conn = settings.connect().await?;
        sqlx::query(&format!(
            r#"CREATE TABLE IF NOT EXISTS `{}` (
            `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
            `data` JSON NOT NULL,
            `create_time` DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
            PRIMARY KEY (`id`));"#,
            table
        ))
        .execute(&mut conn)
        .await?;

        let insert = format!("INSERT INTO `{}` (`data`) VALUES (?);", table);
        let mut tx = conn.begin().await?;
        for input in inputs {
            sqlx::query(&insert)
                .bind(serde_json::to_string(input)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
