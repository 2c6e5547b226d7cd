use crate::{
    Backend, FieldDefinition, FieldSpec, FieldType, IndexSpec, RenderError, normalize_definition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Alter,
    Unchanged,
}

/// Decides create / alter / no-op for a single field or index.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the desired [`FieldSpec`] for `name`. Text equal to one of the
    /// backend's identity column definitions resolves to the identity type.
    pub fn resolve_field(
        &self,
        backend: &dyn Backend,
        name: &str,
        definition: &FieldDefinition,
    ) -> Result<FieldSpec, RenderError> {
        let spec = match definition {
            FieldDefinition::Rendered(text) => match identity_for_text(backend, text) {
                Some(field_type) => FieldSpec::new(name, field_type),
                None => definition.resolve(name)?,
            },
            FieldDefinition::Structured(_) => definition.resolve(name)?,
        };

        Ok(if backend.supports_collations() {
            spec
        } else {
            spec.without_collation()
        })
    }

    #[must_use]
    pub fn compare_field(
        &self,
        backend: &dyn Backend,
        live: Option<&FieldSpec>,
        desired: &FieldSpec,
    ) -> Decision {
        let Some(live) = live else {
            return Decision::Create;
        };

        if field_comparison_key(backend, live) == field_comparison_key(backend, desired) {
            Decision::Unchanged
        } else {
            Decision::Alter
        }
    }

    #[must_use]
    pub fn compare_index(
        &self,
        backend: &dyn Backend,
        live: Option<&IndexSpec>,
        desired: &IndexSpec,
    ) -> Decision {
        let Some(live) = live else {
            return Decision::Create;
        };

        if backend.normalize_index_spec(live) == backend.normalize_index_spec(desired) {
            Decision::Unchanged
        } else {
            Decision::Alter
        }
    }

    /// Live enum values that the desired enum no longer allows.
    #[must_use]
    pub fn removed_enum_values(&self, live: &FieldSpec, desired: &FieldSpec) -> Vec<String> {
        let (Some(live_values), Some(desired_values)) = (live.enum_values(), desired.enum_values())
        else {
            return Vec::new();
        };

        live_values
            .iter()
            .filter(|value| !desired_values.contains(value))
            .cloned()
            .collect()
    }
}

/// Normalized key used to detect no-op field changes. Identity fields compare
/// through the backend's identity renderer.
#[must_use]
pub fn field_comparison_key(backend: &dyn Backend, field: &FieldSpec) -> String {
    match field.field_type() {
        FieldType::Identity { auto_increment } => {
            normalize_definition(&backend.identity_column_definition(false, *auto_increment))
        }
        _ => field.comparison_key(),
    }
}

fn identity_for_text(backend: &dyn Backend, text: &str) -> Option<FieldType> {
    let normalized = normalize_definition(text);
    [true, false].into_iter().find_map(|auto_increment| {
        let matches = [false, true].into_iter().any(|for_alter| {
            normalize_definition(&backend.identity_column_definition(for_alter, auto_increment))
                == normalized
        });
        matches.then_some(FieldType::Identity { auto_increment })
    })
}
