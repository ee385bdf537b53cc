//! Query, update and pipeline descriptions
//!
//! These types are the vocabulary shared between the mapping layer and a
//! [`StoreDriver`](crate::StoreDriver):
//! - Filter: document-shaped predicate (`{field: value}`, `{field: {"$in": [...]}}`)
//! - FindOptions: projection, sort, skip, limit
//! - UpdateSpec: set / unset / pull / push directives
//! - Stage: one step of an aggregation pipeline

use framedb_core::{Document, Value};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// A document predicate
///
/// The representation is the familiar document-store one: top-level keys are
/// field paths mapped either to a value (equality) or to an operator document
/// (`$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`, `$lt`, `$lte`, `$exists`);
/// `$and` / `$or` hold arrays of nested filters.
///
/// Equality against an array field matches when the array contains the
/// value.
///
/// # Examples
///
/// ```
/// use framedb_store::Filter;
///
/// let f = Filter::eq("status", "open").and(Filter::gt("total", 10));
/// assert!(!f.is_empty());
/// assert!(Filter::all().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
    /// Match every document
    pub fn all() -> Self {
        Filter(Document::new())
    }

    /// Wrap a raw filter document
    pub fn from_document(doc: Document) -> Self {
        Filter(doc)
    }

    /// `field == value` (or array field contains value)
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut doc = Document::new();
        doc.insert(field.into(), value.into());
        Filter(doc)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::op(field, "$ne", value.into())
    }

    /// `field` is one of `values`
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::op(field, "$in", Value::Array(values))
    }

    /// `field` is none of `values`
    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::op(field, "$nin", Value::Array(values))
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::op(field, "$gt", value.into())
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::op(field, "$gte", value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::op(field, "$lt", value.into())
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::op(field, "$lte", value.into())
    }

    /// `field` is present (or absent when `exists` is false)
    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Self::op(field, "$exists", Value::Bool(exists))
    }

    /// Both filters must match
    pub fn and(self, other: Filter) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let mut doc = Document::new();
        doc.insert(
            "$and".to_string(),
            Value::Array(vec![Value::Document(self.0), Value::Document(other.0)]),
        );
        Filter(doc)
    }

    /// Any of the filters must match
    pub fn or(filters: Vec<Filter>) -> Self {
        let mut doc = Document::new();
        doc.insert(
            "$or".to_string(),
            Value::Array(filters.into_iter().map(|f| Value::Document(f.0)).collect()),
        );
        Filter(doc)
    }

    /// True when the filter matches everything
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the filter document
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Take the filter document
    pub fn into_document(self) -> Document {
        self.0
    }

    fn op(field: impl Into<String>, op: &str, value: Value) -> Self {
        let mut inner = Document::new();
        inner.insert(op.to_string(), value);
        let mut doc = Document::new();
        doc.insert(field.into(), Value::Document(inner));
        Filter(doc)
    }
}

impl From<Document> for Filter {
    fn from(doc: Document) -> Self {
        Filter(doc)
    }
}

/// Options for `find` / `find_one`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Fields to return (`_id` is always returned); `None` returns all
    pub projection: Option<Vec<String>>,
    /// Sort keys, applied in order
    pub sort: Vec<(String, SortOrder)>,
    /// Documents to skip
    pub skip: Option<u64>,
    /// Maximum documents to return
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict returned fields
    pub fn projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add a sort key
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    /// Skip documents
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Limit documents
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Field-level update directives
///
/// # Examples
///
/// ```
/// use framedb_store::UpdateSpec;
///
/// let spec = UpdateSpec::new()
///     .set_field("status", "closed")
///     .unset_field("draft")
///     .push("tags", "archived");
/// assert!(!spec.is_empty());
/// assert!(UpdateSpec::new().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    /// Fields to overwrite
    pub set: Document,
    /// Fields to remove
    pub unset: Vec<String>,
    /// Array field to value (or `{"$in": [...]}`) to remove
    pub pull: Document,
    /// Array field to value to append
    pub push: Document,
}

impl UpdateSpec {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every field of `doc`
    pub fn set(doc: Document) -> Self {
        UpdateSpec {
            set: doc,
            ..Self::default()
        }
    }

    /// Overwrite one field
    pub fn set_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Remove one field
    pub fn unset_field(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Remove `value` from an array field
    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    /// Remove every one of `values` from an array field
    pub fn pull_all(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        let mut inner = Document::new();
        inner.insert("$in".to_string(), Value::Array(values));
        self.pull.insert(field.into(), Value::Document(inner));
        self
    }

    /// Append `value` to an array field
    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    /// True when no directive is present
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.pull.is_empty() && self.push.is_empty()
    }
}

/// One output column of a `Project` stage
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep the field under its own name
    Include,
    /// Drop the field (only meaningful for `_id`)
    Exclude,
    /// Copy the value found at a dotted path
    Field(String),
    /// Emit a constant
    Literal(Value),
}

/// One aggregation pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the filter
    Match(Filter),
    /// Reshape documents; `_id` is kept unless excluded
    Project(Vec<(String, Projection)>),
    /// Order documents
    Sort(Vec<(String, SortOrder)>),
    /// Drop the first n documents
    Skip(u64),
    /// Keep at most n documents
    Limit(u64),
    /// Emit one document per element of an array field
    Unwind(String),
    /// Replace the stream by `{name: count}`, or nothing when empty
    Count(String),
}

impl Stage {
    /// Build a project stage from `(name, projection)` pairs
    pub fn project<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Projection)>,
        S: Into<String>,
    {
        Stage::Project(
            columns
                .into_iter()
                .map(|(name, projection)| (name.into(), projection))
                .collect(),
        )
    }

    /// Output column names of a project stage (empty for other stages)
    pub fn project_keys(&self) -> Vec<&str> {
        match self {
            Stage::Project(columns) => columns
                .iter()
                .filter(|(_, projection)| *projection != Projection::Exclude)
                .map(|(name, _)| name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}
