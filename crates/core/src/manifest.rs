use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    FieldDefinition, FieldSpec, FieldType, IndexDefinition, IndexKind, RenderError, TableSpec,
};

/// Declarative table layout, usually loaded from YAML.
///
/// ```yaml
/// tables:
///   users:
///     fields:
///       name: "varchar(255) not null default ''"
///       role: { type: enum, values: [admin, member], default: "'member'", nullable: false }
///     indexes:
///       name: true
///       by_role: "(role, name)"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaManifest {
    pub tables: IndexMap<String, TableManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableManifest {
    pub auto_increment: bool,
    pub fields: IndexMap<String, FieldManifest>,
    pub indexes: IndexMap<String, IndexManifest>,
}

impl Default for TableManifest {
    fn default() -> Self {
        Self {
            auto_increment: true,
            fields: IndexMap::new(),
            indexes: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldManifest {
    Rendered(String),
    Structured(StructuredField),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredField {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default = "nullable_by_default")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IndexManifest {
    Flag(bool),
    Rendered(String),
    Structured {
        #[serde(default)]
        kind: Option<String>,
        fields: Vec<String>,
    },
}

impl SchemaManifest {
    pub fn table_specs(&self) -> Result<Vec<TableSpec>, RenderError> {
        self.tables
            .iter()
            .map(|(name, table)| table.to_table_spec(name))
            .collect()
    }
}

impl TableManifest {
    pub fn to_table_spec(&self, name: &str) -> Result<TableSpec, RenderError> {
        let mut spec = TableSpec::new(name).auto_increment(self.auto_increment);
        for (field, manifest) in &self.fields {
            spec.fields
                .insert(field.clone(), manifest.to_definition(field)?);
        }
        for (index, manifest) in &self.indexes {
            spec.indexes
                .insert(index.clone(), manifest.to_definition(index)?);
        }
        Ok(spec)
    }
}

impl FieldManifest {
    pub fn to_definition(&self, field: &str) -> Result<FieldDefinition, RenderError> {
        match self {
            Self::Rendered(text) => Ok(FieldDefinition::Rendered(text.clone())),
            Self::Structured(structured) => structured.to_spec(field).map(FieldDefinition::Structured),
        }
    }
}

impl StructuredField {
    fn to_spec(&self, field: &str) -> Result<FieldSpec, RenderError> {
        let field_type = if self.type_name.trim().eq_ignore_ascii_case("enum") {
            if self.values.is_empty() {
                return Err(RenderError::MalformedField {
                    field: field.to_string(),
                    definition: self.type_name.clone(),
                    reason: "enum needs at least one value".to_string(),
                });
            }
            FieldType::Enum {
                values: self.values.clone(),
            }
        } else {
            let args = match (self.length, self.precision) {
                (Some(length), _) => Some(length.to_string()),
                (None, Some(precision)) => {
                    Some(format!("{precision},{}", self.scale.unwrap_or(0)))
                }
                (None, None) => None,
            };
            FieldType::from_name(&self.type_name, args.as_deref()).ok_or_else(|| {
                RenderError::UnknownFieldType {
                    field: field.to_string(),
                    type_name: self.type_name.clone(),
                }
            })?
        };

        let mut spec = FieldSpec::new(field, field_type).nullable(self.nullable);
        if let Some(default) = &self.default {
            spec = spec.with_default(default.clone());
        }
        if let Some(collation) = &self.collation {
            spec = spec.collate(collation.clone());
        }
        Ok(spec)
    }
}

impl IndexManifest {
    pub fn to_definition(&self, index: &str) -> Result<IndexDefinition, RenderError> {
        match self {
            Self::Flag(flag) => Ok(IndexDefinition::Flag(*flag)),
            Self::Rendered(text) => Ok(IndexDefinition::Rendered(text.clone())),
            Self::Structured { kind, fields } => {
                let kind = match kind {
                    Some(kind) => {
                        IndexKind::from_name(kind).ok_or_else(|| RenderError::MalformedIndex {
                            index: index.to_string(),
                            definition: kind.clone(),
                            reason: "unknown index kind".to_string(),
                        })?
                    }
                    None => IndexKind::Single,
                };
                Ok(IndexDefinition::Structured {
                    kind,
                    fields: fields.clone(),
                })
            }
        }
    }
}

const fn nullable_by_default() -> bool {
    true
}
