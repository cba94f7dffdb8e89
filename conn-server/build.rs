use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::grpc::pb::{}", input))
        .output_type(format!("crate::grpc::pb::{}", output))
        .codec_path(CODEC)
        .build()
}

/// `(rust name, rpc name)`, request and response types follow the rpc name.
fn service(name: &str, rpcs: &[(&str, &str)]) -> Service {
    rpcs.iter()
        .fold(
            Service::builder().name(name).package("connector.v1alpha"),
            |builder, (method, route)| {
                builder.method(unary(
                    method,
                    route,
                    &format!("{}Request", route),
                    &format!("{}Response", route),
                ))
            },
        )
        .build()
}

fn main() {
    let public = service(
        "ConnectorPublicService",
        &[
            ("liveness", "Liveness"),
            ("readiness", "Readiness"),
            ("create_connector_resource", "CreateConnectorResource"),
            ("list_connector_resources", "ListConnectorResources"),
            ("get_connector_resource", "GetConnectorResource"),
            ("update_connector_resource", "UpdateConnectorResource"),
            ("delete_connector_resource", "DeleteConnectorResource"),
            ("look_up_connector_resource", "LookUpConnectorResource"),
            ("connect_connector_resource", "ConnectConnectorResource"),
            ("disconnect_connector_resource", "DisconnectConnectorResource"),
            ("rename_connector_resource", "RenameConnectorResource"),
            ("watch_connector_resource", "WatchConnectorResource"),
            ("test_connector_resource", "TestConnectorResource"),
            ("execute_connector_resource", "ExecuteConnectorResource"),
        ],
    );
    let private = service(
        "ConnectorPrivateService",
        &[
            (
                "list_connector_resources_admin",
                "ListConnectorResourcesAdmin",
            ),
            (
                "look_up_connector_resource_admin",
                "LookUpConnectorResourceAdmin",
            ),
            ("check_connector_resource", "CheckConnectorResource"),
        ],
    );

    Builder::new()
        .build_client(false)
        .compile(&[public, private]);
}
