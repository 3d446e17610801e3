//! Descriptor lookup by concrete type.
//!
//! Objects reach the encoder as `&dyn Any`; the registry finds the schema
//! registered for their `TypeId`. A type with no schema cannot be encoded.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::EncodeError;
use crate::schema::{Described, ResourceDescriptor, Schema};

/// Maps Rust types to their resource descriptors.
///
/// Built once with [`Registry::builder`] and read-only afterwards, so one
/// registry can be shared by concurrent encodes behind an `Arc`.
///
/// # Example
///
/// ```
/// use sideload::v1::{Attributes, DescriptorResult, Registry, ResourceRef, Schema};
///
/// struct Site { id: u32 }
/// struct SiteSchema;
///
/// impl Schema for SiteSchema {
///     type Resource = Site;
///     fn resource_type(&self) -> &str { "sites" }
///     fn id(&self, site: &Site) -> String { site.id.to_string() }
///     fn attributes(&self, _: &Site) -> DescriptorResult<Attributes> { Ok(Attributes::new()) }
/// }
///
/// let registry = Registry::builder().register(SiteSchema).build();
/// let site = Site { id: 1 };
/// let descriptor = registry.resolve(&ResourceRef::object(&site)).unwrap();
/// assert_eq!(descriptor.resource_type(), "sites");
/// assert!(registry.resolve(&ResourceRef::object(&42u8)).is_err());
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    descriptors: HashMap<TypeId, Arc<dyn ResourceDescriptor>>,
}

/// Collects schemas before freezing them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: HashMap<TypeId, Arc<dyn ResourceDescriptor>>,
}

impl RegistryBuilder {
    /// Register `schema` for `S::Resource`. A later registration for the same
    /// type replaces the earlier one.
    pub fn register<S: Schema>(mut self, schema: S) -> Self {
        let descriptor: Arc<dyn ResourceDescriptor> = Arc::new(Described(schema));
        let resource_type = descriptor.resource_type().to_string();
        if let Some(previous) = self
            .descriptors
            .insert(TypeId::of::<S::Resource>(), descriptor)
        {
            warn!(
                rust_type = std::any::type_name::<S::Resource>(),
                previous = previous.resource_type(),
                %resource_type,
                "Replacing resource descriptor"
            );
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            descriptors: self.descriptors,
        }
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Descriptor for the object behind `value`.
    pub fn resolve_object(
        &self,
        value: &dyn Any,
        type_name: &'static str,
    ) -> Result<&dyn ResourceDescriptor, EncodeError> {
        self.descriptors
            .get(&value.type_id())
            .map(|d| d.as_ref())
            .ok_or(EncodeError::UnregisteredType { type_name })
    }

    /// Descriptor for a referenced object.
    ///
    /// Bare identifiers have no descriptor and resolve to
    /// [`EncodeError::UnregisteredType`].
    pub fn resolve(
        &self,
        reference: &crate::schema::ResourceRef<'_>,
    ) -> Result<&dyn ResourceDescriptor, EncodeError> {
        match reference {
            crate::schema::ResourceRef::Object { value, type_name } => {
                self.resolve_object(*value, *type_name)
            }
            crate::schema::ResourceRef::Identifier(_) => Err(EncodeError::UnregisteredType {
                type_name: "resource identifier",
            }),
        }
    }

    /// Descriptor registered for `T`, if any.
    pub fn descriptor_for<T: Any>(&self) -> Option<&dyn ResourceDescriptor> {
        self.descriptors.get(&TypeId::of::<T>()).map(|d| d.as_ref())
    }

    /// Wire types of all registered descriptors, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .descriptors
            .values()
            .map(|d| d.resource_type())
            .collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}
