use crate::error::Result;
use serde_json::Value;

/// Trait for schema validation implementations
pub trait SchemaValidator: Send + Sync {
    /// Validate a JSON value against the schema for a given GVK
    ///
    /// For core resources, group is an empty string.
    fn validate(&self, group: &str, version: &str, kind: &str, value: &Value) -> Result<()>;
}

#[cfg(feature = "validation")]
mod crd_validator {
    use super::*;
    use crate::error::Error;
    use crate::tracker::GVK;
    use jsonschema::JSONSchema;
    use kube::{CustomResourceExt, Resource};
    use std::collections::HashMap;
    use std::sync::RwLock;
    use tracing::debug;

    /// Validates objects against the `openAPIV3Schema` of their CRD
    ///
    /// Only kinds registered with [`CrdSchemaValidator::register`] are checked;
    /// everything else passes.
    #[derive(Default)]
    pub struct CrdSchemaValidator {
        schemas: RwLock<HashMap<GVK, JSONSchema>>,
    }

    impl CrdSchemaValidator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Validator preloaded with the schema of `K`
        pub fn for_resource<K>() -> Result<Self>
        where
            K: CustomResourceExt + Resource<DynamicType = ()>,
        {
            let validator = Self::new();
            validator.register::<K>()?;
            Ok(validator)
        }

        /// Compile and register the schema served for `K`'s version
        pub fn register<K>(&self) -> Result<()>
        where
            K: CustomResourceExt + Resource<DynamicType = ()>,
        {
            let crd = K::crd();
            let version = K::version(&());
            let schema = crd
                .spec
                .versions
                .iter()
                .find(|v| v.name == version)
                .and_then(|v| v.schema.as_ref())
                .and_then(|s| s.open_api_v3_schema.as_ref())
                .ok_or_else(|| {
                    Error::Internal(format!("CRD for {} has no openAPIV3Schema", K::kind(&())))
                })?;

            let schema = serde_json::to_value(schema)?;
            let compiled = JSONSchema::compile(&schema).map_err(|e| {
                Error::Internal(format!(
                    "Failed to compile schema for '{}': {}",
                    K::kind(&()),
                    e
                ))
            })?;

            let gvk = GVK::new(K::group(&()), version, K::kind(&()));
            debug!("Registered schema for {}", gvk.kind);
            self.schemas
                .write()
                .map_err(|e| Error::Internal(format!("Failed to acquire write lock: {}", e)))?
                .insert(gvk, compiled);

            Ok(())
        }
    }

    impl SchemaValidator for CrdSchemaValidator {
        fn validate(&self, group: &str, version: &str, kind: &str, value: &Value) -> Result<()> {
            let schemas = self
                .schemas
                .read()
                .map_err(|e| Error::Internal(format!("Failed to acquire read lock: {}", e)))?;

            let Some(schema) = schemas.get(&GVK::new(group, version, kind)) else {
                return Ok(());
            };

            if let Err(validation_errors) = schema.validate(value) {
                let errors: Vec<String> = validation_errors
                    .map(|e| format!("{}: {}", e.instance_path, e))
                    .collect();

                return Err(Error::ValidationFailed {
                    kind: kind.to_string(),
                    errors,
                });
            }

            Ok(())
        }
    }
}

#[cfg(feature = "validation")]
pub use crd_validator::CrdSchemaValidator;

impl<V: SchemaValidator + ?Sized> SchemaValidator for std::sync::Arc<V> {
    fn validate(&self, group: &str, version: &str, kind: &str, value: &Value) -> Result<()> {
        (**self).validate(group, version, kind, value)
    }
}
