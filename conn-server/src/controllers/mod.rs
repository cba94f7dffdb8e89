pub mod admin;
pub mod connector_resources;
pub mod definitions;
pub mod health;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use conn_storage::{List, State, View};

use crate::services::connector_resources::ConnectorResourceView;

/// `{id}` segment. Namespaced routes also carry `{user}`, checked by
/// [`crate::auth::Caller`].
#[derive(Debug, Deserialize)]
pub struct ResourcePath {
    pub id: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ViewQuery {
    #[serde(default)]
    pub view: View,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceResponse {
    pub connector_resource: ConnectorResourceView,
}

impl From<ConnectorResourceView> for ResourceResponse {
    fn from(connector_resource: ConnectorResourceView) -> Self {
        Self { connector_resource }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListResponse {
    pub connector_resources: Vec<ConnectorResourceView>,
    pub next_page_token: String,
    pub total_size: i64,
}

impl From<List<ConnectorResourceView>> for ListResponse {
    fn from(list: List<ConnectorResourceView>) -> Self {
        Self {
            connector_resources: list.data,
            next_page_token: list.next_page_token,
            total_size: list.total_size,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StateResponse {
    #[schema(value_type = String, example = "STATE_CONNECTED")]
    pub state: State,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OutputsResponse {
    #[schema(value_type = Vec<Object>)]
    pub outputs: Vec<Value>,
}
