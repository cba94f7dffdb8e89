use axum::{extract::Path, routing::get, Json, Router};

use conn_slo::Result;

use crate::{
    services::connector_resources::{self as service, ListParams},
    valid::Valid,
    AppState,
};

use super::{
    ListResponse, ResourcePath, ResourceResponse, StateResponse, ViewQuery,
};

/// Routes served on the private listener only. Callers are trusted.
pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/connector-resources", get(list))
        .route("/admin/connector-resources/{id}/lookUp", get(look_up))
        .route("/admin/connector-resources/{id}/check", get(check))
        .with_state(state)
}

async fn list(
    app: AppState,
    Valid(params): Valid<ListParams>,
) -> Result<Json<ListResponse>> {
    let page = service::list_admin(&app, params).await?;
    Ok(Json(page.into()))
}

async fn look_up(
    app: AppState,
    Path(path): Path<ResourcePath>,
    Valid(query): Valid<ViewQuery>,
) -> Result<Json<ResourceResponse>> {
    let resource = service::look_up(&app, None, &path.id, query.view).await?;
    Ok(Json(resource.into()))
}

async fn check(
    app: AppState,
    Path(path): Path<ResourcePath>,
) -> Result<Json<StateResponse>> {
    let state = service::check(&app, &path.id).await?;
    Ok(Json(StateResponse { state }))
}
