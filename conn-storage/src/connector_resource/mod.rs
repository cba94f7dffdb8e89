mod mariadb;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use mariadb::ConnectorResourceImpl;
pub use memory::MemoryStore;

use conn_slo::Result;

use crate::{ConnectorType, Cursor, List, State, Visibility};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorResource {
    pub uid: String,
    pub id: String,
    /// `users/{uid}`
    pub owner: String,
    pub connector_definition_id: String,
    pub connector_type: ConnectorType,
    pub description: String,
    pub configuration: Value,
    pub state: State,
    pub tombstone: bool,
    pub visibility: Visibility,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl ConnectorResource {
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.create_time, &self.uid)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOpts {
    /// `None` lists every owner.
    pub owner: Option<String>,
    pub connector_type: Option<ConnectorType>,
    pub show_tombstone: bool,
    /// `0` returns everything after the cursor.
    pub page_size: u64,
    pub cursor: Option<Cursor>,
}

impl ListOpts {
    fn matches(&self, resource: &ConnectorResource) -> bool {
        if let Some(owner) = &self.owner {
            if &resource.owner != owner {
                return false;
            }
        }
        if let Some(connector_type) = self.connector_type {
            if resource.connector_type != connector_type {
                return false;
            }
        }
        self.show_tombstone || !resource.tombstone
    }
}

/// Values written by an update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOpts {
    pub description: Option<String>,
    pub configuration: Option<Value>,
}

#[automock]
#[async_trait]
pub trait ConnectorResourceStore: Send + Sync {
    async fn create_connector_resource(
        &self,
        input: &ConnectorResource,
    ) -> Result<()>;
    async fn get_connector_resource(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<ConnectorResource>;
    /// `owner` scopes the lookup; `None` sees every resource.
    async fn get_connector_resource_by_uid(
        &self,
        uid: &str,
        owner: Option<String>,
    ) -> Result<ConnectorResource>;
    async fn list_connector_resources(
        &self,
        opts: &ListOpts,
    ) -> Result<List<ConnectorResource>>;
    async fn update_connector_resource(
        &self,
        owner: &str,
        id: &str,
        opts: &UpdateOpts,
    ) -> Result<ConnectorResource>;
    async fn update_connector_resource_id(
        &self,
        owner: &str,
        id: &str,
        new_id: &str,
    ) -> Result<ConnectorResource>;
    async fn update_connector_resource_state(
        &self,
        uid: &str,
        state: State,
    ) -> Result<()>;
    /// Marks every live resource of the definition as tombstoned and
    /// returns how many rows changed.
    async fn tombstone_connector_resources(
        &self,
        connector_definition_id: &str,
    ) -> Result<u64>;
    async fn delete_connector_resource(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<()>;
}

/// Cuts an ordered, cursor-filtered result down to one page.
pub(crate) fn into_page(
    mut rows: Vec<ConnectorResource>,
    page_size: u64,
    total_size: i64,
) -> List<ConnectorResource> {
    let mut next_page_token = String::new();
    if page_size > 0 && rows.len() as u64 > page_size {
        rows.truncate(page_size as usize);
        if let Some(last) = rows.last() {
            next_page_token = last.cursor().encode();
        }
    }
    List {
        data: rows,
        next_page_token,
        total_size,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    pub(crate) fn resource(owner: &str, id: &str, seconds: i64) -> ConnectorResource {
        let time = Utc.timestamp_opt(seconds, 0).unwrap();
        ConnectorResource {
            uid: uuid::Uuid::new_v4().to_string(),
            id: id.to_owned(),
            owner: owner.to_owned(),
            connector_definition_id: "destination-csv".to_owned(),
            connector_type: ConnectorType::Data,
            description: String::new(),
            configuration: json!({"destination_path": "/local/test"}),
            state: State::Unspecified,
            tombstone: false,
            visibility: Visibility::Private,
            create_time: time,
            update_time: time,
        }
    }

    #[test]
    fn list_opts_scope() {
        let mut item = resource("users/a", "t1", 1);
        let opts = ListOpts {
            owner: Some("users/a".to_owned()),
            ..Default::default()
        };
        assert!(opts.matches(&item));

        item.tombstone = true;
        assert!(!opts.matches(&item));
        assert!(ListOpts {
            show_tombstone: true,
            ..Default::default()
        }
        .matches(&item));

        let other = ListOpts {
            owner: Some("users/b".to_owned()),
            show_tombstone: true,
            ..Default::default()
        };
        assert!(!other.matches(&item));

        let sources = ListOpts {
            connector_type: Some(ConnectorType::Source),
            show_tombstone: true,
            ..Default::default()
        };
        assert!(!sources.matches(&item));
    }

    #[test]
    fn page_token_points_at_last_item() {
        let rows = vec![
            resource("users/a", "t1", 1),
            resource("users/a", "t2", 2),
            resource("users/a", "t3", 3),
        ];
        let page = into_page(rows.clone(), 2, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.total_size, 3);
        assert_eq!(
            Cursor::decode(&page.next_page_token).unwrap(),
            rows[1].cursor()
        );

        let page = into_page(rows.clone(), 3, 3);
        assert_eq!(page.data.len(), 3);
        assert!(page.next_page_token.is_empty());

        let page = into_page(rows, 0, 3);
        assert_eq!(page.data.len(), 3);
        assert!(page.next_page_token.is_empty());
    }
}
