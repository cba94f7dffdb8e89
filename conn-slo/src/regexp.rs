use regex::Regex;
use validator::ValidationError;

lazy_static::lazy_static! {
    /// RFC-1034 label: lower case letters, digits and hyphens, starting with
    /// a letter and ending with a letter or digit.
    static ref RESOURCE_ID: Regex =
        Regex::new(r"^[a-z]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap();
    static ref SQL_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").unwrap();
}

pub fn is_resource_id(value: &str) -> bool {
    RESOURCE_ID.is_match(value)
}

pub fn is_sql_identifier(value: &str) -> bool {
    SQL_IDENTIFIER.is_match(value)
}

pub fn check_resource_id(value: &str) -> Result<(), ValidationError> {
    if is_resource_id(value) {
        return Ok(());
    }
    let mut err = ValidationError::new("resource_id");
    err.message = Some(
        "the id must be an RFC-1034 label of at most 63 characters".into(),
    );
    Err(err)
}
