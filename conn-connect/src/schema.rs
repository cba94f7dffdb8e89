use serde_json::Value;

use conn_slo::{errors, Result};

use crate::definition::ConnectorDefinition;

pub const MASK: &str = "*****";

/// Validates a configuration object against the definition schema.
pub fn validate(schema: &Value, configuration: &Value) -> Result<()> {
    if !configuration.is_object() {
        return Err(errors::invalid_argument(
            "configuration: must be a JSON object",
        ));
    }
    let validator = jsonschema::validator_for(schema).map_err(errors::any)?;
    let violations: Vec<String> = validator
        .iter_errors(configuration)
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{}: {}", path, err)
            }
        })
        .collect();
    if !violations.is_empty() {
        return Err(errors::invalid_argument(&format!(
            "configuration: {}",
            violations.join("; ")
        )));
    }
    Ok(())
}

/// Like [`validate`], but missing fields are tolerated. Used when a
/// resource is written, the full check runs before it connects.
pub fn validate_partial(schema: &Value, configuration: &Value) -> Result<()> {
    let mut relaxed = schema.clone();
    strip_required(&mut relaxed);
    validate(&relaxed, configuration)
}

fn strip_required(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if matches!(map.get("required"), Some(Value::Array(_))) {
                map.remove("required");
            }
            map.values_mut().for_each(strip_required);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_required),
        _ => {}
    }
}

/// Replaces credential values with [`MASK`].
pub fn mask_credentials(
    definition: &ConnectorDefinition,
    configuration: &mut Value,
) {
    let Some(map) = configuration.as_object_mut() else {
        return;
    };
    for field in &definition.credential_fields {
        if let Some(value) = map.get_mut(field) {
            *value = Value::String(MASK.to_owned());
        }
    }
}
