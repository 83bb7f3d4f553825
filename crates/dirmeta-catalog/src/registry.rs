//! Registry of declared metadata fields.
//!
//! Every declared field owns a dedicated indexed table. Field names are
//! restricted to identifiers because they are embedded in storage keys.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CatalogError, CatalogResult};
use crate::tables::{TableStore, FIELD_SEQ};
use crate::types::{FieldDef, FieldId, MetaValue, ValueType, META_SET_STORAGE_TYPE, META_SET_TYPE};

/// Maximum length of a field name.
pub const MAX_FIELD_NAME_LEN: usize = 64;

/// Result of declaring a field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Declared {
    /// The field was created.
    Created(FieldId),
    /// The field already existed with the same type.
    AlreadyExists(FieldId),
}

impl Declared {
    /// The field's identifier.
    pub fn id(&self) -> FieldId {
        match self {
            Declared::Created(id) | Declared::AlreadyExists(id) => *id,
        }
    }

    /// True if this call created the field.
    pub fn is_new(&self) -> bool {
        matches!(self, Declared::Created(_))
    }
}

/// Checks that a field name is a safe identifier.
pub fn validate_field_name(name: &str) -> CatalogResult<()> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start
        || name.len() > MAX_FIELD_NAME_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CatalogError::InvalidFieldName(name.to_string()));
    }
    Ok(())
}

/// Declares, removes and lists metadata fields.
pub struct FieldRegistry {
    tables: Arc<TableStore>,
    strict_text_length: bool,
}

impl FieldRegistry {
    /// Creates a registry over the catalog tables.
    pub fn new(tables: Arc<TableStore>, strict_text_length: bool) -> Self {
        Self {
            tables,
            strict_text_length,
        }
    }

    /// Declares a field, allocating its indexed table.
    ///
    /// Redeclaring with the same type (case-insensitive) succeeds without
    /// touching existing data; a different type is a `TypeConflict`.
    pub fn declare_field(
        &self,
        name: &str,
        declared_type: &str,
        is_meta_set: bool,
    ) -> CatalogResult<Declared> {
        validate_field_name(name)?;
        let declared_type = if is_meta_set { META_SET_TYPE } else { declared_type.trim() };

        if let Some(existing) = self.tables.load_field(name)? {
            if existing.declared_type.eq_ignore_ascii_case(declared_type) {
                tracing::debug!("Metadata field {} already exists", name);
                return Ok(Declared::AlreadyExists(existing.id));
            }
            return Err(CatalogError::TypeConflict {
                field: name.to_string(),
                existing: existing.declared_type,
                requested: declared_type.to_string(),
            });
        }

        let value_type = ValueType::parse(declared_type)
            .ok_or_else(|| CatalogError::UnsupportedType(declared_type.to_string()))?;
        let storage_type = if value_type == ValueType::MetaSet {
            META_SET_STORAGE_TYPE
        } else {
            declared_type
        };

        let id = FieldId::new(self.tables.next_id(FIELD_SEQ)?);
        let def = FieldDef {
            id,
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            value_type,
        };
        self.tables.create_indexed_table(&def, storage_type)?;
        tracing::info!("Added metadata field {} ({}) as {}", name, declared_type, id);
        Ok(Declared::Created(id))
    }

    /// Drops the field's table and its registry entry.
    pub fn remove_field(&self, name: &str) -> CatalogResult<()> {
        if self.tables.load_field(name)?.is_none() {
            return Err(CatalogError::FieldNotFound(name.to_string()));
        }
        let rows = self.tables.drop_table(name)?;
        tracing::info!("Removed metadata field {} ({} values dropped)", name, rows);
        Ok(())
    }

    /// Returns field name to declared type.
    pub fn list_fields(&self) -> CatalogResult<BTreeMap<String, String>> {
        Ok(self
            .tables
            .load_fields()?
            .into_iter()
            .map(|def| (def.name, def.declared_type))
            .collect())
    }

    /// Returns every field definition keyed by name.
    pub fn fields(&self) -> CatalogResult<BTreeMap<String, FieldDef>> {
        Ok(self
            .tables
            .load_fields()?
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect())
    }

    /// Returns one field definition, if declared.
    pub fn field(&self, name: &str) -> CatalogResult<Option<FieldDef>> {
        if validate_field_name(name).is_err() {
            return Ok(None);
        }
        self.tables.load_field(name)
    }

    /// Coerces a value to the field's type.
    pub fn coerce(&self, def: &FieldDef, value: &MetaValue) -> CatalogResult<MetaValue> {
        def.value_type
            .coerce(value, self.strict_text_length)
            .map_err(|reason| CatalogError::InvalidValue {
                field: def.name.clone(),
                value: value.to_string(),
                reason,
            })
    }
}
