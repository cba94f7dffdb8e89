use axum::{extract::Path, routing::get, Json, Router};
use serde::Serialize;

use conn_connect::ConnectorDefinition;
use conn_slo::Result;

use crate::AppState;

pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/connector-definitions", get(list))
        .route("/connector-definitions/{id}", get(get_one))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct DefinitionView {
    name: String,
    #[serde(flatten)]
    definition: ConnectorDefinition,
}

impl From<ConnectorDefinition> for DefinitionView {
    fn from(definition: ConnectorDefinition) -> Self {
        Self {
            name: definition.name(),
            definition,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListResponse {
    connector_definitions: Vec<DefinitionView>,
    next_page_token: String,
    total_size: i64,
}

#[derive(Debug, Serialize)]
struct GetResponse {
    connector_definition: DefinitionView,
}

async fn list(app: AppState) -> Json<ListResponse> {
    let definitions = app.catalog.list_definitions();
    Json(ListResponse {
        total_size: definitions.len() as i64,
        connector_definitions: definitions.into_iter().map(Into::into).collect(),
        next_page_token: String::new(),
    })
}

async fn get_one(
    app: AppState,
    Path(id): Path<String>,
) -> Result<Json<GetResponse>> {
    let definition = app.catalog.get_definition(&id)?;
    Ok(Json(GetResponse {
        connector_definition: definition.into(),
    }))
}
