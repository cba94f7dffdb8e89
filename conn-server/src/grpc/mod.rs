//! gRPC adapters of `connector.v1alpha`. Service stubs are generated by
//! `build.rs`; messages live in [`pb`].

mod convert;
pub mod pb;
mod private;
mod public;

pub use private::PrivateService;
pub use public::PublicService;

pub mod server {
    include!(concat!(
        env!("OUT_DIR"),
        "/connector.v1alpha.ConnectorPublicService.rs"
    ));
    include!(concat!(
        env!("OUT_DIR"),
        "/connector.v1alpha.ConnectorPrivateService.rs"
    ));
}

use tonic::{Request, Status};

use conn_slo::errors;

use crate::{auth::owner_of, AppState};

/// Owner of the subject carried in the `subject_header` metadata entry.
fn caller<T>(app: &AppState, request: &Request<T>) -> Result<String, Status> {
    let subject = request
        .metadata()
        .get(app.config.subject_header.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(errors::unauthenticated)?;
    Ok(owner_of(subject)?)
}
