//! Input validation for configured SQL identifiers
//!
//! Query values are always bound as parameters, but schema, table, and
//! column names arriving from configuration or a context overlay cannot be
//! bound in PostgreSQL. Every such name passes through here before it is
//! interpolated into SQL text.

use crate::error::{BatchError, BatchResult};

/// Redshift caps identifiers at 127 bytes; Postgres at 63. The lower bound
/// of what either end accepts unquoted.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Maximum dotted parts in a qualified name (database.schema.table)
const MAX_QUALIFIED_PARTS: usize = 3;

/// Validates a single unquoted SQL identifier
pub fn validate_identifier(name: &str) -> BatchResult<()> {
    if name.is_empty() {
        return Err(BatchError::invalid_identifier(name, "empty identifier"));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BatchError::invalid_identifier(
            name,
            format!(
                "identifier too long: {} chars (max: {})",
                name.len(),
                MAX_IDENTIFIER_LENGTH
            ),
        ));
    }

    let mut chars = name.chars();
    let first = chars.next().ok_or_else(|| {
        BatchError::invalid_identifier(name, "empty identifier")
    })?;

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(BatchError::invalid_identifier(
            name,
            format!("must start with a letter or underscore, found {first:?}"),
        ));
    }

    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            return Err(BatchError::invalid_identifier(
                name,
                format!("illegal character {c:?}"),
            ));
        }
    }

    Ok(())
}

/// Validates a dot-qualified relation name such as `edw_ods.batch_audit`
pub fn validate_qualified_name(name: &str) -> BatchResult<()> {
    let parts: Vec<&str> = name.split('.').collect();

    if parts.len() > MAX_QUALIFIED_PARTS {
        return Err(BatchError::invalid_identifier(
            name,
            format!(
                "too many qualified parts: {} (max: {})",
                parts.len(),
                MAX_QUALIFIED_PARTS
            ),
        ));
    }

    for part in parts {
        validate_identifier(part).map_err(|_| {
            BatchError::invalid_identifier(name, format!("invalid part {part:?}"))
        })?;
    }

    Ok(())
}
