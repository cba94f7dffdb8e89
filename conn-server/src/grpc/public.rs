use tonic::{Request, Response, Status};

use crate::{
    services::connector_resources::{
        self as service, CreateInput, ListParams, Patch, RenameInput,
    },
    AppState,
};

use super::{caller, convert, pb, server::connector_public_service_server};

const SERVING: i32 = 1;

pub struct PublicService {
    app: AppState,
}

impl PublicService {
    pub fn new(
        app: AppState,
    ) -> connector_public_service_server::ConnectorPublicServiceServer<Self> {
        connector_public_service_server::ConnectorPublicServiceServer::new(
            Self { app },
        )
    }

    /// Caller owner and resource id of a `name` request field.
    fn target<T>(
        &self,
        request: &Request<T>,
        name: &str,
    ) -> Result<(String, String), Status> {
        let owner = caller(&self.app, request)?;
        let id = convert::resource_id(name, &owner)?.to_owned();
        Ok((owner, id))
    }
}

fn serving() -> Option<pb::HealthCheckResponse> {
    Some(pb::HealthCheckResponse { status: SERVING })
}

#[tonic::async_trait]
impl connector_public_service_server::ConnectorPublicService for PublicService {
    async fn liveness(
        &self,
        _request: Request<pb::LivenessRequest>,
    ) -> Result<Response<pb::LivenessResponse>, Status> {
        Ok(Response::new(pb::LivenessResponse {
            health_check_response: serving(),
        }))
    }

    async fn readiness(
        &self,
        _request: Request<pb::ReadinessRequest>,
    ) -> Result<Response<pb::ReadinessResponse>, Status> {
        Ok(Response::new(pb::ReadinessResponse {
            health_check_response: serving(),
        }))
    }

    async fn create_connector_resource(
        &self,
        request: Request<pb::CreateConnectorResourceRequest>,
    ) -> Result<Response<pb::CreateConnectorResourceResponse>, Status> {
        let owner = caller(&self.app, &request)?;
        let resource = convert::required(
            request.into_inner().connector_resource,
            "connector_resource",
        )?;
        let input = CreateInput {
            configuration: resource.configuration.as_ref().map(convert::from_struct),
            visibility: convert::visibility(resource.visibility)?,
            id: resource.id,
            connector_definition_name: resource.connector_definition_name,
            description: resource.description,
        };
        let created = service::create(&self.app, &owner, input).await?;
        Ok(Response::new(pb::CreateConnectorResourceResponse {
            connector_resource: Some(convert::resource(created)),
        }))
    }

    async fn list_connector_resources(
        &self,
        request: Request<pb::ListConnectorResourcesRequest>,
    ) -> Result<Response<pb::ListConnectorResourcesResponse>, Status> {
        let owner = caller(&self.app, &request)?;
        let req = request.into_inner();
        let page = service::list(
            &self.app,
            &owner,
            ListParams {
                filter: req.filter,
                page_size: req.page_size,
                page_token: req.page_token,
                view: convert::view(req.view)?,
            },
        )
        .await?;
        Ok(Response::new(pb::ListConnectorResourcesResponse {
            connector_resources: page
                .data
                .into_iter()
                .map(convert::resource)
                .collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        }))
    }

    async fn get_connector_resource(
        &self,
        request: Request<pb::GetConnectorResourceRequest>,
    ) -> Result<Response<pb::GetConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let view = convert::view(request.get_ref().view)?;
        let resource = service::get(&self.app, &owner, &id, view).await?;
        Ok(Response::new(pb::GetConnectorResourceResponse {
            connector_resource: Some(convert::resource(resource)),
        }))
    }

    async fn update_connector_resource(
        &self,
        request: Request<pb::UpdateConnectorResourceRequest>,
    ) -> Result<Response<pb::UpdateConnectorResourceResponse>, Status> {
        let owner = caller(&self.app, &request)?;
        let req = request.into_inner();
        let resource =
            convert::required(req.connector_resource, "connector_resource")?;
        let id = convert::resource_id(&resource.name, &owner)?;
        let paths = req.update_mask.map(|v| v.paths).unwrap_or_default();
        let patch = Patch {
            description: Some(resource.description.clone()),
            configuration: resource
                .configuration
                .as_ref()
                .map(convert::from_struct),
        };
        let updated =
            service::update(&self.app, &owner, id, paths.as_slice(), patch)
                .await?;
        Ok(Response::new(pb::UpdateConnectorResourceResponse {
            connector_resource: Some(convert::resource(updated)),
        }))
    }

    async fn delete_connector_resource(
        &self,
        request: Request<pb::DeleteConnectorResourceRequest>,
    ) -> Result<Response<pb::DeleteConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        service::delete(&self.app, &owner, &id).await?;
        Ok(Response::new(pb::DeleteConnectorResourceResponse {}))
    }

    async fn look_up_connector_resource(
        &self,
        request: Request<pb::LookUpConnectorResourceRequest>,
    ) -> Result<Response<pb::LookUpConnectorResourceResponse>, Status> {
        let owner = caller(&self.app, &request)?;
        let req = request.into_inner();
        let uid = convert::permalink_uid(&req.permalink)?;
        let resource = service::look_up(
            &self.app,
            Some(&owner),
            uid,
            convert::view(req.view)?,
        )
        .await?;
        Ok(Response::new(pb::LookUpConnectorResourceResponse {
            connector_resource: Some(convert::resource(resource)),
        }))
    }

    async fn connect_connector_resource(
        &self,
        request: Request<pb::ConnectConnectorResourceRequest>,
    ) -> Result<Response<pb::ConnectConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let resource = service::connect(&self.app, &owner, &id).await?;
        Ok(Response::new(pb::ConnectConnectorResourceResponse {
            connector_resource: Some(convert::resource(resource)),
        }))
    }

    async fn disconnect_connector_resource(
        &self,
        request: Request<pb::DisconnectConnectorResourceRequest>,
    ) -> Result<Response<pb::DisconnectConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let resource = service::disconnect(&self.app, &owner, &id).await?;
        Ok(Response::new(pb::DisconnectConnectorResourceResponse {
            connector_resource: Some(convert::resource(resource)),
        }))
    }

    async fn rename_connector_resource(
        &self,
        request: Request<pb::RenameConnectorResourceRequest>,
    ) -> Result<Response<pb::RenameConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let input = RenameInput {
            new_connector_id: request.into_inner().new_connector_id,
        };
        let resource = service::rename(&self.app, &owner, &id, input).await?;
        Ok(Response::new(pb::RenameConnectorResourceResponse {
            connector_resource: Some(convert::resource(resource)),
        }))
    }

    async fn watch_connector_resource(
        &self,
        request: Request<pb::WatchConnectorResourceRequest>,
    ) -> Result<Response<pb::WatchConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let state = service::watch(&self.app, &owner, &id).await?;
        Ok(Response::new(pb::WatchConnectorResourceResponse {
            state: state.number(),
        }))
    }

    async fn test_connector_resource(
        &self,
        request: Request<pb::TestConnectorResourceRequest>,
    ) -> Result<Response<pb::TestConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let state = service::test(&self.app, &owner, &id).await?;
        Ok(Response::new(pb::TestConnectorResourceResponse {
            state: state.number(),
        }))
    }

    async fn execute_connector_resource(
        &self,
        request: Request<pb::ExecuteConnectorResourceRequest>,
    ) -> Result<Response<pb::ExecuteConnectorResourceResponse>, Status> {
        let (owner, id) = self.target(&request, &request.get_ref().name)?;
        let inputs = request
            .into_inner()
            .inputs
            .iter()
            .map(convert::from_struct)
            .collect();
        let outputs =
            service::execute(&self.app, &owner, &id, inputs).await?;
        Ok(Response::new(pb::ExecuteConnectorResourceResponse {
            outputs: outputs.iter().filter_map(convert::to_struct).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prost_types::FieldMask;
    use serde_json::json;
    use tonic::Code;

    use conn_connect::{Connectors, StaticCatalog};
    use conn_storage::{MemoryStore, State};

    use super::*;
    use crate::{
        grpc::server::connector_public_service_server::ConnectorPublicService,
        services::occupancy::NoopOracle, App, AppConfig,
    };

    fn service() -> PublicService {
        PublicService {
            app: AppState(Arc::new(App::with_parts(
                AppConfig::default(),
                Arc::new(MemoryStore::new()),
                Arc::new(StaticCatalog::default()),
                Connectors::default(),
                Arc::new(NoopOracle),
            ))),
        }
    }

    fn request<T>(message: T, subject: &str) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert("jwt-sub", subject.parse().unwrap());
        request
    }

    async fn create(service: &PublicService, id: &str) -> pb::ConnectorResource {
        service
            .create_connector_resource(request(
                pb::CreateConnectorResourceRequest {
                    connector_resource: Some(pb::ConnectorResource {
                        id: id.to_owned(),
                        connector_definition_name:
                            "connector-definitions/destination-mysql".to_owned(),
                        configuration: convert::to_struct(
                            &json!({"host": "db", "port": 3306, "password": "p"}),
                        ),
                        ..Default::default()
                    }),
                },
                "a",
            ))
            .await
            .unwrap()
            .into_inner()
            .connector_resource
            .unwrap()
    }

    #[tokio::test]
    async fn create_and_get_share_rest_semantics() {
        let service = service();
        let created = create(&service, "db").await;
        assert_eq!(created.name, "users/a/connector-resources/db");
        assert_eq!(created.state, State::Unspecified.number());
        let configuration =
            convert::from_struct(created.configuration.as_ref().unwrap());
        assert_eq!(configuration["port"], 3306);
        assert_eq!(configuration["password"], "*****");

        let basic = service
            .get_connector_resource(request(
                pb::GetConnectorResourceRequest {
                    name: created.name.clone(),
                    view: 0,
                },
                "a",
            ))
            .await
            .unwrap()
            .into_inner()
            .connector_resource
            .unwrap();
        assert!(basic.configuration.is_none());
        assert!(basic.connector_definition.is_none());

        let status = service
            .get_connector_resource(request(
                pb::GetConnectorResourceRequest {
                    name: created.name,
                    view: 0,
                },
                "b",
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn missing_subject_is_unauthenticated() {
        let status = service()
            .list_connector_resources(Request::new(
                pb::ListConnectorResourcesRequest::default(),
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn update_with_field_mask() {
        let service = service();
        let created = create(&service, "db").await;
        let updated = service
            .update_connector_resource(request(
                pb::UpdateConnectorResourceRequest {
                    connector_resource: Some(pb::ConnectorResource {
                        name: created.name.clone(),
                        description: "analytics".to_owned(),
                        configuration: convert::to_struct(
                            &json!({"host": "replica"}),
                        ),
                        ..Default::default()
                    }),
                    update_mask: Some(FieldMask {
                        paths: vec![
                            "description".to_owned(),
                            "configuration.host".to_owned(),
                        ],
                    }),
                },
                "a",
            ))
            .await
            .unwrap()
            .into_inner()
            .connector_resource
            .unwrap();
        assert_eq!(updated.description, "analytics");
        let configuration =
            convert::from_struct(updated.configuration.as_ref().unwrap());
        assert_eq!(configuration["host"], "replica");
        assert_eq!(configuration["port"], 3306);

        let status = service
            .update_connector_resource(request(
                pb::UpdateConnectorResourceRequest {
                    connector_resource: Some(pb::ConnectorResource {
                        name: created.name,
                        ..Default::default()
                    }),
                    update_mask: Some(FieldMask {
                        paths: vec!["colour".to_owned()],
                    }),
                },
                "a",
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn execute_requires_connected() {
        let service = service();
        let created = create(&service, "db").await;
        let status = service
            .execute_connector_resource(request(
                pb::ExecuteConnectorResourceRequest {
                    name: created.name,
                    inputs: vec![convert::to_struct(&json!({"a": 1})).unwrap()],
                },
                "a",
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::FailedPrecondition);
    }
}
