use axum::{
    extract::Path,
    routing::{get, post},
    Json, Router,
};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use conn_slo::{errors, Result};

use crate::{
    auth::Caller,
    services::connector_resources::{
        self as service, CreateInput, ListParams, Patch, RenameInput,
    },
    valid::{Body, Valid},
    AppState,
};

use super::{
    ListResponse, OutputsResponse, ResourcePath, ResourceResponse,
    StateResponse, ViewQuery,
};

pub fn new_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/connector-resources", get(list).post(create))
        .route(
            "/connector-resources/{id}",
            get(get_one).patch(update).delete(delete),
        )
        .route("/connector-resources/{id}/rename", post(rename))
        .route("/connector-resources/{id}/connect", post(connect))
        .route("/connector-resources/{id}/disconnect", post(disconnect))
        .route("/connector-resources/{id}/watch", get(watch))
        .route("/connector-resources/{id}/testConnection", post(test))
        .route("/connector-resources/{id}/execute", post(execute))
        .route("/connector-resources/{id}/lookUp", get(look_up));
    Router::new()
        .merge(routes.clone())
        .nest("/users/{user}", routes)
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v1alpha/connector-resources",
    request_body = CreateInput,
    responses(
        (status = 201, description = "created", body = ResourceResponse),
        (status = 400, description = "invalid configuration or id"),
        (status = 409, description = "id already used by the caller"),
    ),
    tag = "connector-resources"
)]
async fn create(
    caller: Caller,
    app: AppState,
    Valid(Json(input)): Valid<Json<CreateInput>>,
) -> Result<(StatusCode, Json<ResourceResponse>)> {
    let created = service::create(&app, &caller.owner, input).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/v1alpha/connector-resources",
    params(
        ("filter" = Option<String>, Query, description = "connector_type=CONNECTOR_TYPE_*"),
        ("page_size" = Option<i64>, Query, description = "0 returns every match, at most 100 otherwise"),
        ("page_token" = Option<String>, Query, description = "next_page_token of the previous page"),
        ("view" = Option<String>, Query, description = "VIEW_BASIC or VIEW_FULL"),
    ),
    responses((status = 200, description = "one page", body = ListResponse)),
    tag = "connector-resources"
)]
async fn list(
    caller: Caller,
    app: AppState,
    Valid(params): Valid<ListParams>,
) -> Result<Json<ListResponse>> {
    let page = service::list(&app, &caller.owner, params).await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/v1alpha/connector-resources/{id}",
    params(
        ("id" = String, Path, description = "resource id"),
        ("view" = Option<String>, Query, description = "VIEW_BASIC or VIEW_FULL"),
    ),
    responses(
        (status = 200, description = "found", body = ResourceResponse),
        (status = 404, description = "no such resource"),
    ),
    tag = "connector-resources"
)]
async fn get_one(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
    Valid(query): Valid<ViewQuery>,
) -> Result<Json<ResourceResponse>> {
    let resource =
        service::get(&app, &caller.owner, &path.id, query.view).await?;
    Ok(Json(resource.into()))
}

/// Field mask of a PATCH body. Keys of a non-empty `configuration` object
/// are merged one by one; an empty or null one replaces the whole object.
fn update_mask(body: &Map<String, Value>) -> Vec<String> {
    let mut paths = Vec::with_capacity(body.len());
    for (key, value) in body {
        match (key.as_str(), value) {
            ("configuration", Value::Object(map)) if !map.is_empty() => {
                paths.extend(map.keys().map(|k| format!("configuration.{}", k)))
            }
            _ => paths.push(key.clone()),
        }
    }
    paths
}

#[utoipa::path(
    patch,
    path = "/v1alpha/connector-resources/{id}",
    params(("id" = String, Path, description = "resource id")),
    responses(
        (status = 200, description = "updated", body = ResourceResponse),
        (status = 400, description = "unknown path or invalid configuration"),
    ),
    tag = "connector-resources"
)]
async fn update(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
    Body(body): Body<Map<String, Value>>,
) -> Result<Json<ResourceResponse>> {
    let paths = update_mask(&body);
    let description = match body.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(v)) => Some(v.clone()),
        Some(_) => {
            return Err(errors::invalid_argument(
                "description: must be a string",
            ))
        }
    };
    let patch = Patch {
        description,
        configuration: body.get("configuration").cloned(),
    };
    let updated =
        service::update(&app, &caller.owner, &path.id, paths.as_slice(), patch)
            .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/v1alpha/connector-resources/{id}",
    params(("id" = String, Path, description = "resource id")),
    responses(
        (status = 204, description = "deleted"),
        (status = 404, description = "no such resource"),
        (status = 400, description = "still referenced by a pipeline"),
    ),
    tag = "connector-resources"
)]
async fn delete(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
) -> Result<StatusCode> {
    service::delete(&app, &caller.owner, &path.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rename(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
    Valid(Json(input)): Valid<Json<RenameInput>>,
) -> Result<Json<ResourceResponse>> {
    let renamed =
        service::rename(&app, &caller.owner, &path.id, input).await?;
    Ok(Json(renamed.into()))
}

async fn connect(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
) -> Result<Json<ResourceResponse>> {
    let resource = service::connect(&app, &caller.owner, &path.id).await?;
    Ok(Json(resource.into()))
}

async fn disconnect(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
) -> Result<Json<ResourceResponse>> {
    let resource =
        service::disconnect(&app, &caller.owner, &path.id).await?;
    Ok(Json(resource.into()))
}

async fn watch(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
) -> Result<Json<StateResponse>> {
    let state = service::watch(&app, &caller.owner, &path.id).await?;
    Ok(Json(StateResponse { state }))
}

async fn test(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
) -> Result<Json<StateResponse>> {
    let state = service::test(&app, &caller.owner, &path.id).await?;
    Ok(Json(StateResponse { state }))
}

#[derive(Debug, Deserialize)]
struct ExecuteInput {
    #[serde(default)]
    inputs: Vec<Value>,
}

async fn execute(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
    Body(input): Body<ExecuteInput>,
) -> Result<Json<OutputsResponse>> {
    let outputs =
        service::execute(&app, &caller.owner, &path.id, input.inputs).await?;
    Ok(Json(OutputsResponse { outputs }))
}

/// `{id}` holds the resource uid here.
async fn look_up(
    caller: Caller,
    app: AppState,
    Path(path): Path<ResourcePath>,
    Valid(query): Valid<ViewQuery>,
) -> Result<Json<ResourceResponse>> {
    let resource =
        service::look_up(&app, Some(&caller.owner), &path.id, query.view)
            .await?;
    Ok(Json(resource.into()))
}
