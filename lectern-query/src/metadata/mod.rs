//! Metadata query execution.
//!
//! A [`MetadataRequest`] is dispatched through the [`OPERATIONS`] table: its
//! parameters are checked against the operation's declared schema, named
//! entities are resolved against the owner's vocabulary, and the operation's
//! handler runs one bounded read against the catalog.

pub mod handlers;
pub mod render;
pub mod schema;

use lectern_core::{
    LecternError, Result,
    traits::LibraryCatalog,
    types::{MetadataRequest, MetadataResult},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use render::render;
pub use schema::{
    Constraint, EntityKind, OPERATIONS, OperationSpec, ParamError, ParamKind, ParamSpec,
    operation_spec,
};

/// Executes metadata operations against a catalog.
#[derive(Debug, Clone)]
pub struct MetadataExecutor {
    catalog: Arc<dyn LibraryCatalog>,
}

impl MetadataExecutor {
    /// Create an executor over `catalog`.
    pub fn new(catalog: Arc<dyn LibraryCatalog>) -> Self {
        Self { catalog }
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &Arc<dyn LibraryCatalog> {
        &self.catalog
    }

    /// Execute one request for `owner`.
    ///
    /// A parameter naming a category, tag or color the owner does not have
    /// yields [`MetadataResult::NotFound`]; an existing but empty one yields a
    /// zero count. Parameters violating the schema are a validation error.
    #[instrument(skip(self, request), fields(operation = %request.operation))]
    pub async fn execute(&self, owner: Uuid, request: &MetadataRequest) -> Result<MetadataResult> {
        let spec = operation_spec(request.operation).ok_or_else(|| {
            LecternError::not_found(format!("metadata handler for {}", request.operation))
        })?;

        let mut params = spec.validate(&request.params).map_err(|e| {
            LecternError::validation(format!("{}: {e}", request.operation))
        })?;

        let names_entity = spec
            .params
            .iter()
            .any(|p| matches!(p.kind, ParamKind::Entity { .. }) && params.contains(p.name));
        if names_entity {
            let vocabulary = self.catalog.vocabulary(owner).await?;
            match spec.resolve_entities(&params, &vocabulary) {
                Ok(resolved) => params = resolved,
                Err((entity, name)) => {
                    info!(%entity, %name, "Metadata target does not exist");
                    return Ok(MetadataResult::not_found(entity.to_string(), name));
                }
            }
        }

        let result = (spec.handler)(self.catalog.as_ref(), owner, &params).await?;
        debug!(?result, "Metadata operation finished");
        Ok(result)
    }
}
