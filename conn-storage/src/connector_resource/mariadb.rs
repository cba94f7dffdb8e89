use async_trait::async_trait;
use sqlx::{mysql::MySqlRow, MySql, MySqlPool, QueryBuilder, Row};

use conn_slo::{errors, Result};

use crate::{now, List, State};

use super::{
    into_page, ConnectorResource, ConnectorResourceStore, ListOpts,
    UpdateOpts,
};

const COLUMNS: &str = r#"`uid`,`id`,`owner`,`connector_definition_id`,
    `connector_type`,`description`,`configuration`,`state`,`tombstone`,
    `visibility`,`create_time`,`update_time`"#;

#[derive(Clone, Debug)]
pub struct ConnectorResourceImpl {
    pool: MySqlPool,
}

impl ConnectorResourceImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_uid(
        &self,
        uid: &str,
        owner: Option<&str>,
    ) -> Result<ConnectorResource> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM `connector_resource` WHERE `deleted` = 0 AND `uid` = ",
            COLUMNS
        ));
        builder.push_bind(uid.to_owned());
        if let Some(owner) = owner {
            builder.push(" AND `owner` = ").push_bind(owner.to_owned());
        }
        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(errors::any)?
            .ok_or_else(|| {
                errors::not_found(&format!("connector resource uid {}", uid))
            })?;
        from_row(&row)
    }
}

fn from_row(row: &MySqlRow) -> Result<ConnectorResource> {
    let configuration: String =
        row.try_get("configuration").map_err(errors::any)?;
    Ok(ConnectorResource {
        uid: row.try_get("uid").map_err(errors::any)?,
        id: row.try_get("id").map_err(errors::any)?,
        owner: row.try_get("owner").map_err(errors::any)?,
        connector_definition_id: row
            .try_get("connector_definition_id")
            .map_err(errors::any)?,
        connector_type: row
            .try_get::<String, _>("connector_type")
            .map_err(errors::any)?
            .parse()?,
        description: row.try_get("description").map_err(errors::any)?,
        configuration: serde_json::from_str(&configuration)
            .map_err(errors::any)?,
        state: row
            .try_get::<String, _>("state")
            .map_err(errors::any)?
            .parse()?,
        tombstone: row.try_get("tombstone").map_err(errors::any)?,
        visibility: row
            .try_get::<String, _>("visibility")
            .map_err(errors::any)?
            .parse()?,
        create_time: row.try_get("create_time").map_err(errors::any)?,
        update_time: row.try_get("update_time").map_err(errors::any)?,
    })
}

fn map_write_error(err: sqlx::Error, id: &str) -> conn_slo::errors::WithBacktrace {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            errors::already_exists(&format!("connector resource {}", id))
        }
        _ => errors::any(err),
    }
}

/// Appends the owner, type and tombstone conditions shared by the count and
/// page queries.
fn push_scope(builder: &mut QueryBuilder<'_, MySql>, opts: &ListOpts) {
    builder.push(" WHERE `deleted` = 0");
    if let Some(owner) = &opts.owner {
        builder.push(" AND `owner` = ").push_bind(owner.clone());
    }
    if let Some(connector_type) = opts.connector_type {
        builder
            .push(" AND `connector_type` = ")
            .push_bind(connector_type.as_str());
    }
    if !opts.show_tombstone {
        builder.push(" AND `tombstone` = 0");
    }
}

#[async_trait]
impl ConnectorResourceStore for ConnectorResourceImpl {
    #[tracing::instrument(skip(self, input), fields(uid = %input.uid))]
    async fn create_connector_resource(
        &self,
        input: &ConnectorResource,
    ) -> Result<()> {
        let configuration =
            serde_json::to_string(&input.configuration).map_err(errors::any)?;
        sqlx::query(
            r#"INSERT INTO `connector_resource`
            (`uid`,`id`,`owner`,`connector_definition_id`,`connector_type`,
            `description`,`configuration`,`state`,`tombstone`,`visibility`,
            `create_time`,`update_time`)
            VALUES(?,?,?,?,?,?,?,?,?,?,?,?);"#,
        )
        .bind(&input.uid)
        .bind(&input.id)
        .bind(&input.owner)
        .bind(&input.connector_definition_id)
        .bind(input.connector_type.as_str())
        .bind(&input.description)
        .bind(configuration)
        .bind(input.state.as_str())
        .bind(input.tombstone)
        .bind(input.visibility.as_str())
        .bind(input.create_time)
        .bind(input.update_time)
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(err, &input.id))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_connector_resource(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<ConnectorResource> {
        let row = sqlx::query(&format!(
            r#"SELECT {} FROM `connector_resource`
            WHERE `owner` = ? AND `id` = ? AND `deleted` = 0;"#,
            COLUMNS
        ))
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(errors::any)?
        .ok_or_else(|| {
            errors::not_found(&format!("connector resource {}", id))
        })?;
        from_row(&row)
    }

    #[tracing::instrument(skip(self))]
    async fn get_connector_resource_by_uid(
        &self,
        uid: &str,
        owner: Option<String>,
    ) -> Result<ConnectorResource> {
        self.fetch_by_uid(uid, owner.as_deref()).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_connector_resources(
        &self,
        opts: &ListOpts,
    ) -> Result<List<ConnectorResource>> {
        let mut count = QueryBuilder::<MySql>::new(
            "SELECT COUNT(*) as count FROM `connector_resource`",
        );
        push_scope(&mut count, opts);
        let total_size: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(errors::any)?
            .try_get("count")
            .map_err(errors::any)?;

        let mut query = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM `connector_resource`",
            COLUMNS
        ));
        push_scope(&mut query, opts);
        if let Some(cursor) = &opts.cursor {
            query
                .push(" AND (`create_time` > ")
                .push_bind(cursor.create_time)
                .push(" OR (`create_time` = ")
                .push_bind(cursor.create_time)
                .push(" AND `uid` > ")
                .push_bind(cursor.uid.clone())
                .push("))");
        }
        query.push(" ORDER BY `create_time` ASC, `uid` ASC");
        if opts.page_size > 0 {
            query.push(" LIMIT ").push_bind(opts.page_size + 1);
        }
        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(errors::any)?
            .iter()
            .map(from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(into_page(rows, opts.page_size, total_size))
    }

    #[tracing::instrument(skip(self, opts))]
    async fn update_connector_resource(
        &self,
        owner: &str,
        id: &str,
        opts: &UpdateOpts,
    ) -> Result<ConnectorResource> {
        let current = self.get_connector_resource(owner, id).await?;
        let mut query = QueryBuilder::<MySql>::new(
            "UPDATE `connector_resource` SET `update_time` = ",
        );
        query.push_bind(now());
        if let Some(description) = &opts.description {
            query.push(", `description` = ").push_bind(description.clone());
        }
        if let Some(configuration) = &opts.configuration {
            let configuration =
                serde_json::to_string(configuration).map_err(errors::any)?;
            query.push(", `configuration` = ").push_bind(configuration);
        }
        query
            .push(" WHERE `uid` = ")
            .push_bind(current.uid.clone())
            .push(" AND `deleted` = 0");
        query
            .build()
            .execute(&self.pool)
            .await
            .map_err(errors::any)?;
        self.fetch_by_uid(&current.uid, None).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_connector_resource_id(
        &self,
        owner: &str,
        id: &str,
        new_id: &str,
    ) -> Result<ConnectorResource> {
        let current = self.get_connector_resource(owner, id).await?;
        sqlx::query(
            r#"UPDATE `connector_resource` SET `id` = ?, `update_time` = ?
            WHERE `uid` = ? AND `deleted` = 0;"#,
        )
        .bind(new_id)
        .bind(now())
        .bind(&current.uid)
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(err, new_id))?;
        self.fetch_by_uid(&current.uid, None).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_connector_resource_state(
        &self,
        uid: &str,
        state: State,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE `connector_resource` SET `state` = ?, `update_time` = ?
            WHERE `uid` = ? AND `deleted` = 0;"#,
        )
        .bind(state.as_str())
        .bind(now())
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(errors::any)?;
        if result.rows_affected() == 0 {
            return Err(errors::not_found(&format!(
                "connector resource uid {}",
                uid
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn tombstone_connector_resources(
        &self,
        connector_definition_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE `connector_resource` SET `tombstone` = 1
            WHERE `connector_definition_id` = ? AND `tombstone` = 0
            AND `deleted` = 0;"#,
        )
        .bind(connector_definition_id)
        .execute(&self.pool)
        .await
        .map_err(errors::any)?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_connector_resource(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE `connector_resource` SET `deleted` = `seq`,`delete_time` = ?
            WHERE `owner` = ? AND `id` = ? AND `deleted` = 0;"#,
        )
        .bind(now())
        .bind(owner)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(errors::any)?;
        if result.rows_affected() == 0 {
            return Err(errors::not_found(&format!(
                "connector resource {}",
                id
            )));
        }
        Ok(())
    }
}
