use crate::models::{Metadata, DOCUMENT_ID_FIELD, TITLE_FIELD};
use serde_json::{json, Value};

/// Predicate restricting a store operation to matching chunk metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn one_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn document(document_id: &str) -> Self {
        Self::eq(DOCUMENT_ID_FIELD, document_id)
    }

    pub fn documents(document_ids: &[String]) -> Self {
        Self::one_of(DOCUMENT_ID_FIELD, document_ids.iter().cloned())
    }

    pub fn title(title: &str) -> Self {
        Self::eq(TITLE_FIELD, title)
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field) == Some(value),
            Self::In { field, values } => metadata
                .get(field)
                .is_some_and(|found| values.contains(found)),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(metadata)),
        }
    }

    /// Chroma `where` clause. Single-element conjunctions are unwrapped since
    /// Chroma rejects `$and` with fewer than two operands.
    pub fn to_chroma_where(&self) -> Value {
        match self {
            Self::Eq { field, value } => json!({ field.as_str(): { "$eq": value } }),
            Self::In { field, values } => json!({ field.as_str(): { "$in": values } }),
            Self::And(filters) => match filters.as_slice() {
                [] => json!({}),
                [only] => only.to_chroma_where(),
                many => json!({
                    "$and": many.iter().map(Self::to_chroma_where).collect::<Vec<_>>()
                }),
            },
        }
    }
}
