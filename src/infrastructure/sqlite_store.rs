use crate::infrastructure::error::InfraError;
use crate::infrastructure::table_client::{
    ColumnKind, Filter, Resource, Row, TableClient, validate_request,
};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Debug, Clone)]
pub struct SqliteTableClient {
    db_path: PathBuf,
}

impl SqliteTableClient {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, InfraError> {
        let client = Self::new(db_path);
        initialize_database(&client.db_path)?;
        Ok(client)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn run<T, F>(&self, work: F) -> Result<T, InfraError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, InfraError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = Connection::open(&db_path)?;
            work(&mut connection)
        })
        .await
        .map_err(|error| InfraError::Remote(format!("sqlite worker failed: {error}")))?
    }
}

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

fn to_sql_value(value: &Value) -> Result<SqlValue, InfraError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => number
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| number.as_f64().map(SqlValue::Real))
            .ok_or_else(|| InfraError::InvalidInput(format!("unsupported number {number}"))),
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        other => Err(InfraError::InvalidInput(format!(
            "nested values cannot be stored in a column: {other}"
        ))),
    }
}

fn where_clause(filters: &[Filter], params: &mut Vec<SqlValue>) -> Result<String, InfraError> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        match filter {
            Filter::Eq(column, value) if value.is_null() => {
                clauses.push(format!("{column} IS NULL"));
            }
            Filter::Eq(column, value) => {
                params.push(to_sql_value(value)?);
                clauses.push(format!("{column} = ?"));
            }
            Filter::In(_, values) if values.is_empty() => clauses.push("0 = 1".to_string()),
            Filter::In(column, values) => {
                for value in values {
                    params.push(to_sql_value(value)?);
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                clauses.push(format!("{column} IN ({placeholders})"));
            }
            Filter::NotNull(column) => clauses.push(format!("{column} IS NOT NULL")),
        }
    }
    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn read_row(resource: Resource, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut output = Row::new();
    for (index, (column, kind)) in resource.columns().iter().enumerate() {
        let value = match kind {
            ColumnKind::Id | ColumnKind::Integer => Value::from(row.get::<_, i64>(index)?),
            ColumnKind::Text => Value::String(row.get::<_, String>(index)?),
            ColumnKind::OptionalText => row
                .get::<_, Option<String>>(index)?
                .map(Value::String)
                .unwrap_or(Value::Null),
            ColumnKind::Bool => Value::Bool(row.get::<_, i64>(index)? != 0),
        };
        output.insert(column.to_string(), value);
    }
    Ok(output)
}

fn select_rows(
    connection: &Connection,
    resource: Resource,
    filters: &[Filter],
) -> Result<Vec<Row>, InfraError> {
    let columns = resource
        .columns()
        .iter()
        .map(|(column, _)| *column)
        .collect::<Vec<_>>()
        .join(", ");
    let mut params = Vec::new();
    let sql = format!(
        "SELECT {columns} FROM {}{} ORDER BY id",
        resource.table_name(),
        where_clause(filters, &mut params)?
    );

    let mut statement = connection.prepare(&sql)?;
    let rows = statement
        .query_map(params_from_iter(params.iter()), |row| read_row(resource, row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[async_trait]
impl TableClient for SqliteTableClient {
    async fn select(&self, resource: Resource, filters: &[Filter]) -> Result<Vec<Row>, InfraError> {
        validate_request(resource, filters, None, "select", false)?;
        let filters = filters.to_vec();
        self.run(move |connection| select_rows(connection, resource, &filters))
            .await
    }

    async fn insert(&self, resource: Resource, rows: Vec<Row>) -> Result<Vec<Row>, InfraError> {
        for row in &rows {
            validate_request(resource, &[], Some(row), "insert", false)?;
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        self.run(move |connection| {
            let transaction = connection.transaction()?;
            let mut inserted_ids = Vec::with_capacity(rows.len());
            for row in &rows {
                let columns = row
                    .keys()
                    .filter(|column| column.as_str() != "id")
                    .cloned()
                    .collect::<Vec<_>>();
                let params = columns
                    .iter()
                    .map(|column| to_sql_value(&row[column]))
                    .collect::<Result<Vec<_>, _>>()?;
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", resource.table_name())
                } else {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        resource.table_name(),
                        columns.join(", "),
                        vec!["?"; columns.len()].join(", ")
                    )
                };
                transaction.execute(&sql, params_from_iter(params.iter()))?;
                inserted_ids.push(Value::from(transaction.last_insert_rowid()));
            }

            let inserted = select_rows(&transaction, resource, &[Filter::In("id", inserted_ids)])?;
            transaction.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn update(&self, resource: Resource, filters: &[Filter], patch: Row) -> Result<(), InfraError> {
        validate_request(resource, filters, Some(&patch), "update", true)?;
        if patch.contains_key("id") {
            return Err(InfraError::InvalidInput("id cannot be updated".to_string()));
        }
        if patch.is_empty() {
            return Ok(());
        }

        let filters = filters.to_vec();
        self.run(move |connection| {
            let mut params = Vec::with_capacity(patch.len());
            let mut assignments = Vec::with_capacity(patch.len());
            for (column, value) in &patch {
                params.push(to_sql_value(value)?);
                assignments.push(format!("{column} = ?"));
            }
            let sql = format!(
                "UPDATE {} SET {}{}",
                resource.table_name(),
                assignments.join(", "),
                where_clause(&filters, &mut params)?
            );
            connection.execute(&sql, params_from_iter(params.iter()))?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, resource: Resource, filters: &[Filter]) -> Result<(), InfraError> {
        validate_request(resource, filters, None, "delete", true)?;
        let filters = filters.to_vec();
        self.run(move |connection| {
            let mut params = Vec::new();
            let sql = format!(
                "DELETE FROM {}{}",
                resource.table_name(),
                where_clause(&filters, &mut params)?
            );
            connection.execute(&sql, params_from_iter(params.iter()))?;
            Ok(())
        })
        .await
    }
}
