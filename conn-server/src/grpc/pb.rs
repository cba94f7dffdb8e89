//! Wire messages of `connector.v1alpha`. Enumerations travel as their
//! protobuf numbers.

use prost_types::{FieldMask, Struct, Timestamp};

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectorDefinition {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub uid: String,
    #[prost(string, tag = "3")]
    pub id: String,
    #[prost(string, tag = "4")]
    pub title: String,
    #[prost(int32, tag = "5")]
    pub connector_type: i32,
    #[prost(string, tag = "6")]
    pub kind: String,
    #[prost(bool, tag = "7")]
    pub tombstone: bool,
    #[prost(message, optional, tag = "8")]
    pub connection_specification: Option<Struct>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectorResource {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub uid: String,
    #[prost(string, tag = "3")]
    pub id: String,
    #[prost(string, tag = "4")]
    pub connector_definition_name: String,
    #[prost(int32, tag = "5")]
    pub connector_type: i32,
    #[prost(string, tag = "6")]
    pub description: String,
    #[prost(message, optional, tag = "7")]
    pub configuration: Option<Struct>,
    #[prost(int32, tag = "8")]
    pub state: i32,
    #[prost(bool, tag = "9")]
    pub tombstone: bool,
    #[prost(string, tag = "10")]
    pub user: String,
    #[prost(message, optional, tag = "11")]
    pub create_time: Option<Timestamp>,
    #[prost(message, optional, tag = "12")]
    pub update_time: Option<Timestamp>,
    #[prost(int32, tag = "13")]
    pub visibility: i32,
    #[prost(message, optional, tag = "14")]
    pub connector_definition: Option<ConnectorDefinition>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HealthCheckResponse {
    /// 1 is SERVING.
    #[prost(int32, tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LivenessRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LivenessResponse {
    #[prost(message, optional, tag = "1")]
    pub health_check_response: Option<HealthCheckResponse>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadinessRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadinessResponse {
    #[prost(message, optional, tag = "1")]
    pub health_check_response: Option<HealthCheckResponse>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateConnectorResourceRequest {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListConnectorResourcesRequest {
    #[prost(int64, tag = "1")]
    pub page_size: i64,
    #[prost(string, tag = "2")]
    pub page_token: String,
    #[prost(int32, tag = "3")]
    pub view: i32,
    #[prost(string, tag = "4")]
    pub filter: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListConnectorResourcesResponse {
    #[prost(message, repeated, tag = "1")]
    pub connector_resources: Vec<ConnectorResource>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
    #[prost(int64, tag = "3")]
    pub total_size: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, tag = "2")]
    pub view: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateConnectorResourceRequest {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
    #[prost(message, optional, tag = "2")]
    pub update_mask: Option<FieldMask>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteConnectorResourceResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LookUpConnectorResourceRequest {
    /// `connector-resources/{uid}`
    #[prost(string, tag = "1")]
    pub permalink: String,
    #[prost(int32, tag = "2")]
    pub view: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LookUpConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DisconnectConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DisconnectConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RenameConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub new_connector_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RenameConnectorResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WatchConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WatchConnectorResourceResponse {
    #[prost(int32, tag = "1")]
    pub state: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TestConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TestConnectorResourceResponse {
    #[prost(int32, tag = "1")]
    pub state: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ExecuteConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub inputs: Vec<Struct>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ExecuteConnectorResourceResponse {
    #[prost(message, repeated, tag = "1")]
    pub outputs: Vec<Struct>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListConnectorResourcesAdminRequest {
    #[prost(int64, tag = "1")]
    pub page_size: i64,
    #[prost(string, tag = "2")]
    pub page_token: String,
    #[prost(int32, tag = "3")]
    pub view: i32,
    #[prost(string, tag = "4")]
    pub filter: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListConnectorResourcesAdminResponse {
    #[prost(message, repeated, tag = "1")]
    pub connector_resources: Vec<ConnectorResource>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
    #[prost(int64, tag = "3")]
    pub total_size: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LookUpConnectorResourceAdminRequest {
    #[prost(string, tag = "1")]
    pub permalink: String,
    #[prost(int32, tag = "2")]
    pub view: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LookUpConnectorResourceAdminResponse {
    #[prost(message, optional, tag = "1")]
    pub connector_resource: Option<ConnectorResource>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CheckConnectorResourceRequest {
    #[prost(string, tag = "1")]
    pub permalink: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CheckConnectorResourceResponse {
    #[prost(int32, tag = "1")]
    pub state: i32,
}
