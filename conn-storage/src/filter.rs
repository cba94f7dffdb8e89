use conn_slo::{errors, Result};

use crate::ConnectorType;

/// Parsed listing filter. Only equality on `connector_type` is understood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    pub connector_type: Option<ConnectorType>,
}

impl Filter {
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Self::default());
        }
        let (field, value) = expr.split_once('=').ok_or_else(|| {
            errors::invalid_argument(&format!(
                "filter: unsupported expression `{}`",
                expr
            ))
        })?;
        let value = value.trim().trim_matches('"');
        match field.trim() {
            "connector_type" => {
                let connector_type =
                    value.parse::<ConnectorType>().map_err(|_| {
                        errors::invalid_argument(&format!(
                            "filter: unknown connector_type `{}`",
                            value
                        ))
                    })?;
                Ok(Self {
                    connector_type: Some(connector_type),
                })
            }
            other => Err(errors::invalid_argument(&format!(
                "filter: unsupported field `{}`",
                other
            ))),
        }
    }
}
