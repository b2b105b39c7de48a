//! Declared parameter schemas for metadata operations.
//!
//! [`OPERATIONS`] is the single table the classifier prompt, parameter
//! validation and the executor's dispatch all read from. Adding an operation
//! means adding a variant, one table row and one handler.

use lectern_core::{
    traits::Vocabulary,
    types::{MetadataOperation, ParamValue, ParamValues, SourceType},
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::handlers::{self, Handler};

/// Library vocabulary a parameter value must resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A category name.
    Category,
    /// A tag name.
    Tag,
    /// A color label.
    Color,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Color => "color",
        })
    }
}

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// A name that must exist in the owner's library.
    Entity {
        /// Which vocabulary.
        entity: EntityKind,
    },
    /// One of the source type names.
    SourceType,
    /// A bounded integer.
    Integer {
        /// Inclusive minimum.
        min: i64,
        /// Inclusive maximum.
        max: i64,
    },
    /// `true` or `false`.
    Bool,
    /// An ISO-8601 calendar date.
    Date,
}

/// One declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Value type.
    #[serde(flatten)]
    pub kind: ParamKind,
    /// Whether the parameter must be present.
    pub required: bool,
    /// Short description for the classifier prompt.
    pub description: &'static str,
}

/// Extra constraint spanning several parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// No constraint.
    None,
    /// At least one of these parameters must be present.
    AnyOf(&'static [&'static str]),
}

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct OperationSpec {
    /// The operation.
    pub operation: MetadataOperation,
    /// Description for the classifier prompt.
    pub description: &'static str,
    /// Declared parameters. Anything else is rejected.
    pub params: &'static [ParamSpec],
    /// Cross-parameter constraint.
    pub constraint: Constraint,
    /// Handler executing the operation.
    pub handler: Handler,
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("operation", &self.operation)
            .field("params", &self.params)
            .field("constraint", &self.constraint)
            .finish_non_exhaustive()
    }
}

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: i64 = 10;
/// Largest listing page.
pub const MAX_LIST_LIMIT: i64 = 50;

const LIMIT: ParamSpec = ParamSpec {
    name: "limit",
    kind: ParamKind::Integer {
        min: 1,
        max: MAX_LIST_LIMIT,
    },
    required: false,
    description: "maximum number of entries to return",
};

const CATEGORY: ParamSpec = ParamSpec {
    name: "category",
    kind: ParamKind::Entity {
        entity: EntityKind::Category,
    },
    required: false,
    description: "category name",
};

const TAG: ParamSpec = ParamSpec {
    name: "tag",
    kind: ParamKind::Entity {
        entity: EntityKind::Tag,
    },
    required: false,
    description: "tag name",
};

const COLOR: ParamSpec = ParamSpec {
    name: "color",
    kind: ParamKind::Entity {
        entity: EntityKind::Color,
    },
    required: false,
    description: "color label name",
};

const SOURCE_TYPE: ParamSpec = ParamSpec {
    name: "source_type",
    kind: ParamKind::SourceType,
    required: false,
    description: "one of url, pdf, arxiv, video",
};

const IS_READ: ParamSpec = ParamSpec {
    name: "is_read",
    kind: ParamKind::Bool,
    required: false,
    description: "read status",
};

const DAYS: ParamSpec = ParamSpec {
    name: "days",
    kind: ParamKind::Integer { min: 1, max: 3650 },
    required: false,
    description: "look back this many days (week = 7, month = 30, year = 365)",
};

const AFTER: ParamSpec = ParamSpec {
    name: "after",
    kind: ParamKind::Date,
    required: false,
    description: "saved on or after this date (YYYY-MM-DD)",
};

const BEFORE: ParamSpec = ParamSpec {
    name: "before",
    kind: ParamKind::Date,
    required: false,
    description: "saved before this date (YYYY-MM-DD)",
};

/// The metadata dispatch table.
pub static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        operation: MetadataOperation::TotalCount,
        description: "total number of articles in the library",
        params: &[],
        constraint: Constraint::None,
        handler: handlers::total_count,
    },
    OperationSpec {
        operation: MetadataOperation::CountByCategory,
        description: "number of articles in a category or carrying a tag; \
                      without parameters, counts for every category",
        params: &[CATEGORY, TAG],
        constraint: Constraint::None,
        handler: handlers::count_by_category,
    },
    OperationSpec {
        operation: MetadataOperation::CountByTag,
        description: "number of articles with a tag; without parameters, counts for every tag",
        params: &[TAG],
        constraint: Constraint::None,
        handler: handlers::count_by_tag,
    },
    OperationSpec {
        operation: MetadataOperation::CountByMediaType,
        description: "number of articles per source type, or for one source type",
        params: &[SOURCE_TYPE],
        constraint: Constraint::None,
        handler: handlers::count_by_media_type,
    },
    OperationSpec {
        operation: MetadataOperation::CountByColor,
        description: "number of articles per color label, or for one color",
        params: &[COLOR],
        constraint: Constraint::None,
        handler: handlers::count_by_color,
    },
    OperationSpec {
        operation: MetadataOperation::ListCategories,
        description: "the category tree with article counts",
        params: &[],
        constraint: Constraint::None,
        handler: handlers::list_categories,
    },
    OperationSpec {
        operation: MetadataOperation::ListTags,
        description: "all tags sorted by usage",
        params: &[],
        constraint: Constraint::None,
        handler: handlers::list_tags,
    },
    OperationSpec {
        operation: MetadataOperation::ListByFilter,
        description: "list articles matching category, tag, color, source type, \
                      read status or save date",
        params: &[CATEGORY, TAG, COLOR, SOURCE_TYPE, IS_READ, DAYS, AFTER, BEFORE, LIMIT],
        constraint: Constraint::AnyOf(&[
            "category",
            "tag",
            "color",
            "source_type",
            "is_read",
            "days",
            "after",
            "before",
        ]),
        handler: handlers::list_by_filter,
    },
    OperationSpec {
        operation: MetadataOperation::ArticlesInDateRange,
        description: "articles saved within a period",
        params: &[DAYS, AFTER, BEFORE, LIMIT],
        constraint: Constraint::AnyOf(&["days", "after", "before"]),
        handler: handlers::articles_in_date_range,
    },
    OperationSpec {
        operation: MetadataOperation::RecentArticles,
        description: "most recently saved articles",
        params: &[LIMIT],
        constraint: Constraint::None,
        handler: handlers::recent_articles,
    },
    OperationSpec {
        operation: MetadataOperation::TopSources,
        description: "most frequent source domains",
        params: &[LIMIT],
        constraint: Constraint::None,
        handler: handlers::top_sources,
    },
    OperationSpec {
        operation: MetadataOperation::LibrarySummary,
        description: "overall library statistics",
        params: &[],
        constraint: Constraint::None,
        handler: handlers::library_summary,
    },
];

/// Look up the table row for an operation.
pub fn operation_spec(operation: MetadataOperation) -> Option<&'static OperationSpec> {
    OPERATIONS.iter().find(|spec| spec.operation == operation)
}

/// Why a parameter set does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// A parameter the operation does not declare.
    Unknown(String),
    /// A required parameter is absent.
    Missing(&'static str),
    /// None of a required group is present.
    NoneOf(&'static [&'static str]),
    /// A value has the wrong type or is out of range.
    Invalid {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "unknown parameter '{name}'"),
            Self::Missing(name) => write!(f, "missing required parameter '{name}'"),
            Self::NoneOf(names) => write!(f, "expected at least one of {names:?}"),
            Self::Invalid { name, value } => write!(f, "invalid value '{value}' for '{name}'"),
        }
    }
}

impl OperationSpec {
    /// Check types, ranges and presence, returning normalized values.
    ///
    /// Entity names are trimmed but not resolved; see
    /// [`resolve_entities`](Self::resolve_entities).
    pub fn validate(&self, params: &ParamValues) -> Result<ParamValues, ParamError> {
        for (name, _) in params.iter() {
            if !self.params.iter().any(|p| p.name == name) {
                return Err(ParamError::Unknown(name.to_string()));
            }
        }

        let mut normalized = ParamValues::new();
        for spec in self.params {
            match params.get(spec.name) {
                Some(value) => {
                    normalized.insert(spec.name, normalize(spec, value)?);
                }
                None if spec.required => return Err(ParamError::Missing(spec.name)),
                None => {}
            }
        }

        if let Constraint::AnyOf(names) = self.constraint {
            if !names.iter().any(|name| normalized.contains(name)) {
                return Err(ParamError::NoneOf(names));
            }
        }
        if let (Some(after), Some(before)) = (normalized.date("after"), normalized.date("before")) {
            if after >= before {
                return Err(ParamError::Invalid {
                    name: "before",
                    value: before.to_string(),
                });
            }
        }
        Ok(normalized)
    }

    /// Replace entity names with their canonical spelling.
    ///
    /// Returns the first entity that does not exist in `vocabulary`.
    pub fn resolve_entities(
        &self,
        params: &ParamValues,
        vocabulary: &Vocabulary,
    ) -> Result<ParamValues, (EntityKind, String)> {
        let mut resolved = params.clone();
        for spec in self.params {
            let ParamKind::Entity { entity } = spec.kind else {
                continue;
            };
            let Some(name) = params.text(spec.name) else {
                continue;
            };
            let canonical = match entity {
                EntityKind::Category => vocabulary.resolve_category(name),
                EntityKind::Tag => vocabulary.resolve_tag(name),
                EntityKind::Color => vocabulary.resolve_color(name),
            };
            match canonical {
                Some(canonical) => resolved.insert(spec.name, ParamValue::Text(canonical.into())),
                None => return Err((entity, name.to_string())),
            }
        }
        Ok(resolved)
    }
}

fn normalize(spec: &ParamSpec, value: &ParamValue) -> Result<ParamValue, ParamError> {
    let invalid = || ParamError::Invalid {
        name: spec.name,
        value: value.to_string(),
    };
    let single = ParamValues::new().with(spec.name, value.clone());

    match spec.kind {
        ParamKind::Entity { .. } => match value {
            ParamValue::Text(text) if !text.trim().is_empty() => {
                Ok(ParamValue::Text(text.trim().to_string()))
            }
            _ => Err(invalid()),
        },
        ParamKind::SourceType => match value {
            ParamValue::Text(text) => SourceType::from_str(text.trim())
                .map(|st| ParamValue::Text(st.to_string()))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ParamKind::Integer { min, max } => single
            .integer(spec.name)
            .filter(|n| (min..=max).contains(n))
            .map(ParamValue::Integer)
            .ok_or_else(invalid),
        ParamKind::Bool => single
            .boolean(spec.name)
            .map(ParamValue::Bool)
            .ok_or_else(invalid),
        ParamKind::Date => single
            .date(spec.name)
            .map(ParamValue::Date)
            .ok_or_else(invalid),
    }
}
