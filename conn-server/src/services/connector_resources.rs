use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use conn_connect::{
    schema::{self, mask_credentials},
    ConnectorDefinition,
};
use conn_slo::{
    errors::{self, Code},
    regexp::check_resource_id,
    Result,
};
use conn_storage::{
    now, page_size, ConnectorResource, ConnectorType, Cursor, Filter, List,
    ListOpts, State, UpdateOpts, View, Visibility,
};

use crate::{var::CONNECTOR_EXECUTIONS_TOTAL, App};

const DEFINITION_PREFIX: &str = "connector-definitions/";

/// Output only or immutable fields. Masks naming them are accepted and
/// ignored.
const IGNORED_PATHS: &[&str] = &[
    "name",
    "uid",
    "id",
    "user",
    "owner",
    "connector_definition_name",
    "connector_type",
    "state",
    "tombstone",
    "create_time",
    "update_time",
    "visibility",
    "connector_definition",
];

/// Connector resource as returned by both transports.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConnectorResourceView {
    /// `users/{uid}/connector-resources/{id}`
    pub name: String,
    pub uid: String,
    pub id: String,
    pub connector_definition_name: String,
    #[schema(value_type = String, example = "CONNECTOR_TYPE_DATA")]
    pub connector_type: ConnectorType,
    pub description: String,
    /// Null in the BASIC view.
    #[schema(value_type = Option<Object>)]
    pub configuration: Option<Value>,
    #[schema(value_type = String, example = "STATE_CONNECTED")]
    pub state: State,
    pub tombstone: bool,
    pub user: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    #[schema(value_type = String, example = "VISIBILITY_PRIVATE")]
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub connector_definition: Option<ConnectorDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateInput {
    #[serde(default)]
    #[validate(custom(function = "check_resource_id"))]
    pub id: String,
    /// `connector-definitions/{id}`
    #[serde(default)]
    pub connector_definition_name: String,
    #[serde(default)]
    #[validate(length(max = 1023))]
    pub description: String,
    #[schema(value_type = Option<Object>)]
    pub configuration: Option<Value>,
    #[schema(value_type = Option<String>)]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListParams {
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub filter: String,
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub page_token: String,
    #[serde(default)]
    pub view: View,
}

/// New values of an update. Only the fields named by the mask are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub description: Option<String>,
    pub configuration: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RenameInput {
    #[serde(default)]
    #[validate(custom(function = "check_resource_id"))]
    pub new_connector_id: String,
}

/// Field mask of an update, reduced to the mutable fields.
#[derive(Debug, Default, PartialEq)]
struct Mask {
    description: bool,
    configuration: bool,
    keys: Vec<String>,
}

impl Mask {
    fn parse<S: AsRef<str>>(paths: &[S]) -> Result<Self> {
        let mut mask = Self::default();
        for path in paths {
            let path = path.as_ref().trim();
            match path {
                "description" => mask.description = true,
                "configuration" => mask.configuration = true,
                v if IGNORED_PATHS.contains(&v) => {}
                v => match v.strip_prefix("configuration.") {
                    Some(key) if !key.is_empty() => {
                        mask.keys.push(key.to_owned())
                    }
                    _ => {
                        return Err(errors::invalid_argument(&format!(
                            "update_mask: unknown path {:?}",
                            v
                        )))
                    }
                },
            }
        }
        Ok(mask)
    }

    fn is_empty(&self) -> bool {
        !self.description && !self.configuration && self.keys.is_empty()
    }

    fn touches_configuration(&self) -> bool {
        self.configuration || !self.keys.is_empty()
    }

    /// `configuration` replaces the whole object, `configuration.<key>`
    /// copies one key from the patch and drops it when the patch has no
    /// value for it.
    fn apply(&self, current: Value, patch: Option<&Value>) -> Result<Value> {
        let mut configuration = if self.configuration {
            match patch {
                None | Some(Value::Null) => json!({}),
                Some(v) => v.clone(),
            }
        } else {
            current
        };
        if self.keys.is_empty() {
            return Ok(configuration);
        }
        let target = configuration.as_object_mut().ok_or_else(|| {
            errors::invalid_argument("configuration: must be an object")
        })?;
        for key in &self.keys {
            match patch.and_then(|v| v.get(key)) {
                None | Some(Value::Null) => {
                    target.remove(key);
                }
                Some(value) => {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(configuration)
    }
}

fn or_basic(view: View) -> View {
    match view {
        View::Unspecified => View::Basic,
        v => v,
    }
}

pub fn project(
    app: &App,
    resource: ConnectorResource,
    view: View,
) -> ConnectorResourceView {
    let name = format!("{}/connector-resources/{}", resource.owner, resource.id);
    let connector_definition_name =
        format!("{}{}", DEFINITION_PREFIX, resource.connector_definition_id);
    let (configuration, connector_definition) = if view.is_full() {
        let definition = app
            .catalog
            .get_definition(&resource.connector_definition_id)
            .ok();
        let mut configuration = resource.configuration;
        if let Some(definition) = &definition {
            mask_credentials(definition, &mut configuration);
        }
        (Some(configuration), definition)
    } else {
        (None, None)
    };
    ConnectorResourceView {
        name,
        uid: resource.uid,
        id: resource.id,
        connector_definition_name,
        connector_type: resource.connector_type,
        description: resource.description,
        configuration,
        state: resource.state,
        tombstone: resource.tombstone,
        user: resource.owner,
        create_time: resource.create_time,
        update_time: resource.update_time,
        visibility: resource.visibility,
        connector_definition,
    }
}

fn definition_of(
    app: &App,
    resource: &ConnectorResource,
) -> Result<ConnectorDefinition> {
    app.catalog
        .get_definition(&resource.connector_definition_id)
        .map_err(|_| {
            errors::failed_precondition(&format!(
                "connector definition {} is no longer available",
                resource.connector_definition_id
            ))
        })
}

/// Definition of a resource whose configuration is complete.
fn connectable(
    app: &App,
    resource: &ConnectorResource,
) -> Result<ConnectorDefinition> {
    let definition = definition_of(app, resource)?;
    schema::validate(
        &definition.connection_specification,
        &resource.configuration,
    )?;
    Ok(definition)
}

fn parse_uid(uid: &str) -> Result<()> {
    uuid::Uuid::parse_str(uid).map(|_| ()).map_err(|err| {
        errors::invalid_argument(&format!("permalink: invalid uid {}: {}", uid, err))
    })
}

#[tracing::instrument(skip(app, input), fields(id = %input.id))]
pub async fn create(
    app: &App,
    owner: &str,
    input: CreateInput,
) -> Result<ConnectorResourceView> {
    input.validate().map_err(Code::Validates)?;
    let definition_id = input
        .connector_definition_name
        .strip_prefix(DEFINITION_PREFIX)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            errors::invalid_argument(&format!(
                "connector_definition_name: expected {}{{id}}, got {:?}",
                DEFINITION_PREFIX, input.connector_definition_name
            ))
        })?;
    let definition =
        app.catalog.get_definition(definition_id).map_err(|_| {
            errors::invalid_argument(&format!(
                "connector_definition_name: unknown definition {}",
                definition_id
            ))
        })?;
    if definition.tombstone {
        return Err(errors::invalid_argument(&format!(
            "connector_definition_name: {} is deprecated",
            definition_id
        )));
    }
    let configuration = input
        .configuration
        .ok_or_else(|| errors::invalid_argument("configuration: required"))?;
    schema::validate_partial(
        &definition.connection_specification,
        &configuration,
    )?;

    let created = now();
    let resource = ConnectorResource {
        uid: uuid::Uuid::new_v4().to_string(),
        id: input.id,
        owner: owner.to_owned(),
        connector_definition_id: definition.id.clone(),
        connector_type: definition.connector_type,
        description: input.description,
        configuration,
        state: State::Unspecified,
        tombstone: false,
        visibility: match input.visibility {
            None | Some(Visibility::Unspecified) => Visibility::Private,
            Some(v) => v,
        },
        create_time: created,
        update_time: created,
    };
    app.store.create_connector_resource(&resource).await?;
    info!(uid = %resource.uid, definition = %definition.id, "created");
    Ok(project(app, resource, View::Full))
}

async fn list_scoped(
    app: &App,
    owner: Option<String>,
    show_tombstone: bool,
    params: ListParams,
) -> Result<List<ConnectorResourceView>> {
    params.validate().map_err(Code::Validates)?;
    let filter = Filter::parse(&params.filter)?;
    let page_size = page_size(params.page_size)?;
    let cursor = match params.page_token.as_str() {
        "" => None,
        token => Some(Cursor::decode(token)?),
    };
    let page = app
        .store
        .list_connector_resources(&ListOpts {
            owner,
            connector_type: filter.connector_type,
            show_tombstone,
            page_size,
            cursor,
        })
        .await?;
    let view = or_basic(params.view);
    Ok(List {
        data: page
            .data
            .into_iter()
            .map(|v| project(app, v, view))
            .collect(),
        next_page_token: page.next_page_token,
        total_size: page.total_size,
    })
}

/// Live resources of `owner`.
pub async fn list(
    app: &App,
    owner: &str,
    params: ListParams,
) -> Result<List<ConnectorResourceView>> {
    list_scoped(app, Some(owner.to_owned()), false, params).await
}

/// Every resource of every owner, tombstoned ones included.
pub async fn list_admin(
    app: &App,
    params: ListParams,
) -> Result<List<ConnectorResourceView>> {
    list_scoped(app, None, true, params).await
}

pub async fn get(
    app: &App,
    owner: &str,
    id: &str,
    view: View,
) -> Result<ConnectorResourceView> {
    let resource = app.store.get_connector_resource(owner, id).await?;
    Ok(project(app, resource, or_basic(view)))
}

/// `owner` is `None` for admin callers.
pub async fn look_up(
    app: &App,
    owner: Option<&str>,
    uid: &str,
    view: View,
) -> Result<ConnectorResourceView> {
    parse_uid(uid)?;
    let resource = app
        .store
        .get_connector_resource_by_uid(uid, owner.map(str::to_owned))
        .await?;
    Ok(project(app, resource, or_basic(view)))
}

#[tracing::instrument(skip(app, patch))]
pub async fn update<S: AsRef<str> + std::fmt::Debug>(
    app: &App,
    owner: &str,
    id: &str,
    paths: &[S],
    patch: Patch,
) -> Result<ConnectorResourceView> {
    let mask = Mask::parse(paths)?;
    let current = app.store.get_connector_resource(owner, id).await?;
    if mask.is_empty() {
        return Ok(project(app, current, View::Full));
    }
    let _guard = app.machine.lock(&current.uid).await?;
    let current = app
        .store
        .get_connector_resource_by_uid(&current.uid, Some(owner.to_owned()))
        .await?;
    if current.state == State::Connected {
        return Err(errors::failed_precondition(&format!(
            "connector resource {} is connected, disconnect it before updating",
            id
        )));
    }

    let mut opts = UpdateOpts::default();
    if mask.description {
        opts.description = Some(patch.description.unwrap_or_default());
    }
    if mask.touches_configuration() {
        let definition = definition_of(app, &current)?;
        let configuration =
            mask.apply(current.configuration, patch.configuration.as_ref())?;
        schema::validate_partial(
            &definition.connection_specification,
            &configuration,
        )?;
        opts.configuration = Some(configuration);
    }
    let updated = app
        .store
        .update_connector_resource(owner, &current.id, &opts)
        .await?;
    info!(uid = %updated.uid, "updated");
    Ok(project(app, updated, View::Full))
}

#[tracing::instrument(skip(app))]
pub async fn delete(app: &App, owner: &str, id: &str) -> Result<()> {
    let resource = app.store.get_connector_resource(owner, id).await?;
    let _guard = app.machine.lock(&resource.uid).await?;
    let pipelines = app.oracle.referenced_by(&resource.uid).await?;
    if !pipelines.is_empty() {
        return Err(errors::failed_precondition(&format!(
            "still in use by pipeline: {}",
            pipelines.join(", ")
        )));
    }
    app.store.delete_connector_resource(owner, id).await?;
    app.machine.forget(&resource.uid);
    info!(uid = %resource.uid, "deleted");
    Ok(())
}

#[tracing::instrument(skip(app, input))]
pub async fn rename(
    app: &App,
    owner: &str,
    id: &str,
    input: RenameInput,
) -> Result<ConnectorResourceView> {
    input.validate().map_err(Code::Validates)?;
    let current = app.store.get_connector_resource(owner, id).await?;
    let _guard = app.machine.lock(&current.uid).await?;
    let renamed = app
        .store
        .update_connector_resource_id(owner, id, &input.new_connector_id)
        .await?;
    info!(uid = %renamed.uid, new_id = %renamed.id, "renamed");
    Ok(project(app, renamed, View::Full))
}

#[tracing::instrument(skip(app))]
pub async fn connect(
    app: &App,
    owner: &str,
    id: &str,
) -> Result<ConnectorResourceView> {
    let resource = app.store.get_connector_resource(owner, id).await?;
    let definition = connectable(app, &resource)?;
    app.machine.connect(&resource, definition.kind).await?;
    let current = app.store.get_connector_resource(owner, id).await?;
    Ok(project(app, current, View::Full))
}

#[tracing::instrument(skip(app))]
pub async fn disconnect(
    app: &App,
    owner: &str,
    id: &str,
) -> Result<ConnectorResourceView> {
    let resource = app.store.get_connector_resource(owner, id).await?;
    app.machine.disconnect(&resource.uid).await?;
    let current = app.store.get_connector_resource(owner, id).await?;
    Ok(project(app, current, View::Full))
}

pub async fn watch(app: &App, owner: &str, id: &str) -> Result<State> {
    Ok(app.store.get_connector_resource(owner, id).await?.state)
}

#[tracing::instrument(skip(app))]
pub async fn test(app: &App, owner: &str, id: &str) -> Result<State> {
    let resource = app.store.get_connector_resource(owner, id).await?;
    let definition = connectable(app, &resource)?;
    app.machine.test(&resource, definition.kind).await
}

/// Hands `inputs` to the connector in the background. The returned outputs
/// are always empty.
#[tracing::instrument(skip(app, inputs), fields(inputs = inputs.len()))]
pub async fn execute(
    app: &App,
    owner: &str,
    id: &str,
    inputs: Vec<Value>,
) -> Result<Vec<Value>> {
    if inputs.is_empty() {
        return Err(errors::invalid_argument("inputs: must not be empty"));
    }
    if let Some(index) = inputs.iter().position(|v| !v.is_object()) {
        return Err(errors::invalid_argument(&format!(
            "inputs[{}]: must be an object",
            index
        )));
    }
    let resource = app.store.get_connector_resource(owner, id).await?;
    if resource.tombstone {
        return Err(errors::failed_precondition(
            "connector definition is deprecated",
        ));
    }
    if resource.state != State::Connected {
        return Err(errors::failed_precondition(&format!(
            "connector resource {} is not connected",
            id
        )));
    }
    let definition = definition_of(app, &resource)?;
    let connector = app.connectors.get(definition.kind)?;

    tokio::spawn(async move {
        let status = match connector
            .deliver(&resource.configuration, &inputs)
            .await
        {
            Ok(()) => "completed",
            Err(err) => {
                error!(uid = %resource.uid, "delivery failed: {:#}", err);
                "errored"
            }
        };
        CONNECTOR_EXECUTIONS_TOTAL
            .with_label_values(&[definition.id.as_str(), status])
            .inc();
    });
    Ok(Vec::new())
}

/// Re-probes a connected resource. Anything not connected reports
/// `STATE_DISCONNECTED` without probing.
#[tracing::instrument(skip(app))]
pub async fn check(app: &App, uid: &str) -> Result<State> {
    parse_uid(uid)?;
    let resource = app.store.get_connector_resource_by_uid(uid, None).await?;
    if resource.state != State::Connected {
        return Ok(State::Disconnected);
    }
    let definition = match connectable(app, &resource) {
        Ok(v) => v,
        Err(err) => {
            warn!("connected resource no longer validates: {}", err);
            return Ok(State::Error);
        }
    };
    app.machine.test(&resource, definition.kind).await
}

/// Marks the resources of deprecated definitions.
pub async fn reconcile_tombstones(app: &App) -> Result<u64> {
    let mut total = 0;
    for definition in app.catalog.list_definitions() {
        if !definition.tombstone {
            continue;
        }
        let changed = app
            .store
            .tombstone_connector_resources(&definition.id)
            .await?;
        if changed > 0 {
            info!(definition = %definition.id, changed, "tombstoned");
        }
        total += changed;
    }
    Ok(total)
}
