use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Blocks,
    Tasks,
    LibraryBlocks,
    LibraryTasks,
    Backlog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Id,
    Integer,
    Text,
    OptionalText,
    Bool,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Blocks,
        Resource::Tasks,
        Resource::LibraryBlocks,
        Resource::LibraryTasks,
        Resource::Backlog,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Tasks => "tasks",
            Self::LibraryBlocks => "library_blocks",
            Self::LibraryTasks => "library_tasks",
            Self::Backlog => "backlog",
        }
    }

    pub fn columns(self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Self::Blocks => &[
                ("id", ColumnKind::Id),
                ("title", ColumnKind::Text),
                ("color", ColumnKind::Text),
                ("date", ColumnKind::Text),
                ("x", ColumnKind::Integer),
                ("y", ColumnKind::Integer),
            ],
            Self::Tasks | Self::LibraryTasks => &[
                ("id", ColumnKind::Id),
                ("block_id", ColumnKind::Integer),
                ("title", ColumnKind::Text),
                ("time", ColumnKind::OptionalText),
                ("completed", ColumnKind::Bool),
            ],
            Self::LibraryBlocks => &[
                ("id", ColumnKind::Id),
                ("title", ColumnKind::Text),
                ("color", ColumnKind::Text),
            ],
            Self::Backlog => &[("id", ColumnKind::Id), ("title", ColumnKind::Text)],
        }
    }

    pub fn column_kind(self, column: &str) -> Option<ColumnKind> {
        self.columns()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
    }

    pub fn ensure_column(self, column: &str) -> Result<ColumnKind, InfraError> {
        self.column_kind(column).ok_or_else(|| {
            InfraError::InvalidInput(format!(
                "unknown column '{column}' for table {}",
                self.table_name()
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
    NotNull(&'static str),
}

impl Filter {
    pub fn id(id: i64) -> Self {
        Self::Eq("id", Value::from(id))
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Eq(column, _) | Self::In(column, _) | Self::NotNull(column) => column,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let field = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Self::Eq(_, expected) => field == expected,
            Self::In(_, candidates) => candidates.contains(field),
            Self::NotNull(_) => !field.is_null(),
        }
    }
}

#[async_trait]
pub trait TableClient: Send + Sync {
    async fn select(&self, resource: Resource, filters: &[Filter]) -> Result<Vec<Row>, InfraError>;

    async fn insert(&self, resource: Resource, rows: Vec<Row>) -> Result<Vec<Row>, InfraError>;

    async fn update(&self, resource: Resource, filters: &[Filter], patch: Row) -> Result<(), InfraError>;

    async fn delete(&self, resource: Resource, filters: &[Filter]) -> Result<(), InfraError>;
}

pub fn validate_request(
    resource: Resource,
    filters: &[Filter],
    row: Option<&Row>,
    operation: &str,
    require_filter: bool,
) -> Result<(), InfraError> {
    if require_filter && filters.is_empty() {
        return Err(InfraError::InvalidInput(format!(
            "refusing unfiltered {operation} on {}",
            resource.table_name()
        )));
    }
    for filter in filters {
        resource.ensure_column(filter.column())?;
    }
    if let Some(row) = row {
        for column in row.keys() {
            resource.ensure_column(column)?;
        }
    }
    Ok(())
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, InfraError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(InfraError::InvalidInput(format!(
            "expected an object for a table row, got {other}"
        ))),
    }
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, InfraError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(InfraError::from))
        .collect()
}

pub async fn select_as<T, C>(client: &C, resource: Resource, filters: &[Filter]) -> Result<Vec<T>, InfraError>
where
    T: DeserializeOwned,
    C: TableClient + ?Sized,
{
    from_rows(client.select(resource, filters).await?)
}

pub async fn insert_as<T, N, C>(client: &C, resource: Resource, records: &[N]) -> Result<Vec<T>, InfraError>
where
    T: DeserializeOwned,
    N: Serialize,
    C: TableClient + ?Sized,
{
    let rows = records.iter().map(to_row).collect::<Result<Vec<_>, _>>()?;
    from_rows(client.insert(resource, rows).await?)
}

pub async fn insert_one<T, N, C>(client: &C, resource: Resource, record: &N) -> Result<T, InfraError>
where
    T: DeserializeOwned,
    N: Serialize,
    C: TableClient + ?Sized,
{
    insert_as::<T, N, C>(client, resource, std::slice::from_ref(record))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            InfraError::Remote(format!(
                "insert into {} returned no rows",
                resource.table_name()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(row) => row,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn filters_match_rows() {
        let task = row(json!({ "id": 4, "block_id": 2, "title": "Run", "time": null }));
        assert!(Filter::id(4).matches(&task));
        assert!(!Filter::id(5).matches(&task));
        assert!(Filter::In("block_id", vec![json!(1), json!(2)]).matches(&task));
        assert!(!Filter::In("block_id", Vec::new()).matches(&task));
        assert!(!Filter::NotNull("time").matches(&task));
        assert!(Filter::NotNull("title").matches(&task));
    }

    #[test]
    fn validation_rejects_unknown_columns_and_unfiltered_writes() {
        let patch = row(json!({ "x": 1, "z": 2 }));
        assert!(validate_request(Resource::Blocks, &[Filter::id(1)], Some(&patch), "update", true).is_err());
        assert!(validate_request(Resource::Blocks, &[], None, "delete", true).is_err());
        assert!(validate_request(Resource::Backlog, &[], None, "select", false).is_ok());
        assert!(
            validate_request(Resource::Tasks, &[Filter::NotNull("time")], None, "select", false).is_ok()
        );
    }

    #[test]
    fn every_resource_has_an_id_column() {
        for resource in Resource::ALL {
            assert_eq!(resource.column_kind("id"), Some(ColumnKind::Id));
        }
    }

    #[test]
    fn to_row_rejects_non_objects() {
        assert!(to_row(&vec![1, 2]).is_err());
        let converted = to_row(&json!({ "title": "Read" })).expect("object row");
        assert_eq!(converted.get("title"), Some(&json!("Read")));
    }
}
