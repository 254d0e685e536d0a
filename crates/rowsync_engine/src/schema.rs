//! Field set projection.

use crate::error::ConfigError;
use rowsync_protocol::{FieldMap, SourceRow};
use tracing::warn;

/// The ordered, deduplicated list of fields read, compared, and written.
///
/// Layout is `[identity, primary_key, other source columns...]`. The
/// identity field is fetched from the destination but never compared or
/// written; everything after it is the projected surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<String>,
}

impl FieldSet {
    /// Derives the field set from the source schema.
    ///
    /// Fails if the primary key is not a source column or names the
    /// identity field. A source column named like the identity field is
    /// dropped.
    pub fn project(
        columns: &[String],
        primary_key: &str,
        identity_field: &str,
    ) -> Result<Self, ConfigError> {
        if primary_key == identity_field {
            return Err(ConfigError::PrimaryKeyIsIdentity(primary_key.to_string()));
        }
        if !columns.iter().any(|c| c == primary_key) {
            return Err(ConfigError::MissingPrimaryKey {
                key: primary_key.to_string(),
                columns: columns.to_vec(),
            });
        }

        let mut fields = Vec::with_capacity(columns.len() + 1);
        fields.push(identity_field.to_string());
        fields.push(primary_key.to_string());

        for column in columns {
            if column == identity_field {
                warn!(column = %column, "source column shadows the identity field, ignoring it");
                continue;
            }
            if !fields.contains(column) {
                fields.push(column.clone());
            }
        }

        Ok(Self { fields })
    }

    /// Identity field name.
    pub fn identity(&self) -> &str {
        &self.fields[0]
    }

    /// Primary key field name.
    pub fn primary_key(&self) -> &str {
        &self.fields[1]
    }

    /// All fields, identity first.
    pub fn all(&self) -> &[String] {
        &self.fields
    }

    /// Fields used for comparison and payloads (everything but identity).
    pub fn projected(&self) -> &[String] {
        &self.fields[1..]
    }

    /// Number of fields including identity.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false; a field set holds at least identity and primary key.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Projects a source row onto the comparison surface.
    pub fn project_row(&self, row: &SourceRow) -> FieldMap {
        self.projected()
            .iter()
            .map(|name| (name.clone(), row.value(name).clone()))
            .collect()
    }
}
