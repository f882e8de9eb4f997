//! Asynchronous type resolution
//!
//! Resolving a node's type is the only asynchronous step of mounting. The
//! default resolver looks the kind up in the runtime's type registry; other
//! resolvers may fetch or build definitions lazily.

use std::sync::Arc;

use async_trait::async_trait;
use loom_core::{ComponentDefinition, DefinitionLookup, WidgetKind};

use crate::error::{ResolveError, ResolveResult};

#[async_trait]
pub trait TypeResolver: Send + Sync {
    /// Definition for `kind`
    ///
    /// `known` holds the runtime's registered definitions; a resolver may
    /// ignore it. Definitions it does not know yet are registered once
    /// resolved.
    async fn resolve(
        &self,
        kind: &WidgetKind,
        known: &dyn DefinitionLookup,
    ) -> ResolveResult<Arc<ComponentDefinition>>;
}

/// Looks kinds up in the type registry
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryResolver;

#[async_trait]
impl TypeResolver for RegistryResolver {
    async fn resolve(
        &self,
        kind: &WidgetKind,
        known: &dyn DefinitionLookup,
    ) -> ResolveResult<Arc<ComponentDefinition>> {
        known
            .definition(kind)
            .ok_or_else(|| ResolveError::not_registered(kind.as_tag()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::TypeRegistry;

    #[tokio::test]
    async fn test_registry_resolver() {
        let mut registry = TypeRegistry::new();
        registry.register(ComponentDefinition::new("button"));

        let def = RegistryResolver
            .resolve(&WidgetKind::Button, &registry)
            .await
            .unwrap();
        assert_eq!(def.kind, WidgetKind::Button);

        let err = RegistryResolver
            .resolve(&WidgetKind::from_tag("frobnicator"), &registry)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::not_registered("frobnicator"));
    }
}
