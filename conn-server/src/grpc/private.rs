use tonic::{Request, Response, Status};

use crate::{
    services::connector_resources::{self as service, ListParams},
    AppState,
};

use super::{convert, pb, server::connector_private_service_server};

/// Admin surface. Sees every owner and tombstoned resources.
pub struct PrivateService {
    app: AppState,
}

impl PrivateService {
    pub fn new(
        app: AppState,
    ) -> connector_private_service_server::ConnectorPrivateServiceServer<Self>
    {
        connector_private_service_server::ConnectorPrivateServiceServer::new(
            Self { app },
        )
    }
}

#[tonic::async_trait]
impl connector_private_service_server::ConnectorPrivateService
    for PrivateService
{
    async fn list_connector_resources_admin(
        &self,
        request: Request<pb::ListConnectorResourcesAdminRequest>,
    ) -> Result<Response<pb::ListConnectorResourcesAdminResponse>, Status> {
        let req = request.into_inner();
        let page = service::list_admin(
            &self.app,
            ListParams {
                filter: req.filter,
                page_size: req.page_size,
                page_token: req.page_token,
                view: convert::view(req.view)?,
            },
        )
        .await?;
        Ok(Response::new(pb::ListConnectorResourcesAdminResponse {
            connector_resources: page
                .data
                .into_iter()
                .map(convert::resource)
                .collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        }))
    }

    async fn look_up_connector_resource_admin(
        &self,
        request: Request<pb::LookUpConnectorResourceAdminRequest>,
    ) -> Result<Response<pb::LookUpConnectorResourceAdminResponse>, Status>
    {
        let req = request.into_inner();
        let uid = convert::permalink_uid(&req.permalink)?;
        let resource =
            service::look_up(&self.app, None, uid, convert::view(req.view)?)
                .await?;
        Ok(Response::new(pb::LookUpConnectorResourceAdminResponse {
            connector_resource: Some(convert::resource(resource)),
        }))
    }

    async fn check_connector_resource(
        &self,
        request: Request<pb::CheckConnectorResourceRequest>,
    ) -> Result<Response<pb::CheckConnectorResourceResponse>, Status> {
        let req = request.into_inner();
        let uid = convert::permalink_uid(&req.permalink)?;
        let state = service::check(&self.app, uid).await?;
        Ok(Response::new(pb::CheckConnectorResourceResponse {
            state: state.number(),
        }))
    }
}
