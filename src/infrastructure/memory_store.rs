use crate::infrastructure::error::InfraError;
use crate::infrastructure::table_client::{Filter, Resource, Row, TableClient, validate_request};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryTableClient {
    tables: Mutex<HashMap<Resource, MemoryTable>>,
}

impl InMemoryTableClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Resource, MemoryTable>>, InfraError> {
        self.tables
            .lock()
            .map_err(|error| InfraError::Remote(format!("in-memory table lock poisoned: {error}")))
    }

    pub fn row_count(&self, resource: Resource) -> Result<usize, InfraError> {
        let tables = self.lock()?;
        Ok(tables.get(&resource).map(|table| table.rows.len()).unwrap_or(0))
    }
}

fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

#[async_trait]
impl TableClient for InMemoryTableClient {
    async fn select(&self, resource: Resource, filters: &[Filter]) -> Result<Vec<Row>, InfraError> {
        validate_request(resource, filters, None, "select", false)?;
        let tables = self.lock()?;
        let Some(table) = tables.get(&resource) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .values()
            .filter(|row| matches_all(filters, row))
            .cloned()
            .collect())
    }

    async fn insert(&self, resource: Resource, rows: Vec<Row>) -> Result<Vec<Row>, InfraError> {
        for row in &rows {
            validate_request(resource, &[], Some(row), "insert", false)?;
        }

        let mut tables = self.lock()?;
        let table = tables.entry(resource).or_default();
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            table.next_id += 1;
            let id = table.next_id;
            for (column, _) in resource.columns() {
                row.entry(column.to_string()).or_insert(Value::Null);
            }
            row.insert("id".to_string(), Value::from(id));
            table.rows.insert(id, row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, resource: Resource, filters: &[Filter], patch: Row) -> Result<(), InfraError> {
        validate_request(resource, filters, Some(&patch), "update", true)?;
        if patch.contains_key("id") {
            return Err(InfraError::InvalidInput("id cannot be updated".to_string()));
        }

        let mut tables = self.lock()?;
        let Some(table) = tables.get_mut(&resource) else {
            return Ok(());
        };
        for row in table.rows.values_mut().filter(|row| matches_all(filters, row)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, resource: Resource, filters: &[Filter]) -> Result<(), InfraError> {
        validate_request(resource, filters, None, "delete", true)?;
        let mut tables = self.lock()?;
        if let Some(table) = tables.get_mut(&resource) {
            table.rows.retain(|_, row| !matches_all(filters, row));
        }
        Ok(())
    }
}
