use crate::infrastructure::error::InfraError;
use crate::infrastructure::table_client::{Filter, Resource, Row, TableClient, validate_request};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

const REST_PATH: &str = "rest/v1/";

#[derive(Debug, Clone)]
pub struct RestTableClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RestTableClient {
    pub fn new(project_url: &str, api_key: &str) -> Result<Self, InfraError> {
        Self::with_client(Client::new(), project_url, api_key)
    }

    pub fn with_client(client: Client, project_url: &str, api_key: &str) -> Result<Self, InfraError> {
        Self::ensure_non_empty(project_url, "project url")?;
        Self::ensure_non_empty(api_key, "api key")?;

        let mut project_url = project_url.trim().to_string();
        if !project_url.ends_with('/') {
            project_url.push('/');
        }
        let base_url = Url::parse(&project_url)
            .and_then(|url| url.join(REST_PATH))
            .map_err(|error| InfraError::InvalidConfig(format!("invalid project url: {error}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.trim().to_string(),
        })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(resource: Resource, status: StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("{}: http {}", resource.table_name(), status.as_u16())
        } else {
            format!("{}: http {}; body={body}", resource.table_name(), status.as_u16())
        };
        InfraError::Remote(message)
    }

    pub fn table_endpoint(&self, resource: Resource) -> Result<Url, InfraError> {
        self.base_url
            .join(resource.table_name())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid table url: {error}")))
    }

    fn request(&self, builder: RequestBuilder, filters: &[Filter]) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&filter_params(filters))
    }

    async fn send(
        &self,
        resource: Resource,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<String, InfraError> {
        let table = resource.table_name();
        let response = request.send().await.map_err(|error| {
            InfraError::Remote(format!("network error during {operation} on {table}: {error}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading {operation} response from {table}: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::http_error(resource, status, &body));
        }
        Ok(body)
    }

    fn parse_rows(resource: Resource, body: &str) -> Result<Vec<Row>, InfraError> {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str::<Vec<Row>>(body).map_err(|error| {
            InfraError::Remote(format!(
                "invalid {} payload: {error}; body={body}",
                resource.table_name()
            ))
        })
    }
}

pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, Value::Null) => (column.to_string(), "is.null".to_string()),
            Filter::Eq(column, value) => (column.to_string(), format!("eq.{}", literal(value))),
            Filter::In(column, values) => {
                let list = values
                    .iter()
                    .map(quoted_literal)
                    .collect::<Vec<_>>()
                    .join(",");
                (column.to_string(), format!("in.({list})"))
            }
            Filter::NotNull(column) => (column.to_string(), "not.is.null".to_string()),
        })
        .collect()
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn quoted_literal(value: &Value) -> String {
    match value {
        Value::String(text) => format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableClient for RestTableClient {
    async fn select(&self, resource: Resource, filters: &[Filter]) -> Result<Vec<Row>, InfraError> {
        validate_request(resource, filters, None, "select", false)?;
        let endpoint = self.table_endpoint(resource)?;
        let request = self
            .request(self.client.get(endpoint), filters)
            .query(&[("select", "*"), ("order", "id.asc")]);
        let body = self.send(resource, "select", request).await?;
        Self::parse_rows(resource, &body)
    }

    async fn insert(&self, resource: Resource, rows: Vec<Row>) -> Result<Vec<Row>, InfraError> {
        for row in &rows {
            validate_request(resource, &[], Some(row), "insert", false)?;
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint = self.table_endpoint(resource)?;
        let request = self
            .request(self.client.post(endpoint), &[])
            .query(&[("select", "*")])
            .header("Prefer", "return=representation")
            .json(&rows);
        let body = self.send(resource, "insert", request).await?;
        Self::parse_rows(resource, &body)
    }

    async fn update(&self, resource: Resource, filters: &[Filter], patch: Row) -> Result<(), InfraError> {
        validate_request(resource, filters, Some(&patch), "update", true)?;
        let endpoint = self.table_endpoint(resource)?;
        let request = self
            .request(self.client.patch(endpoint), filters)
            .header("Prefer", "return=minimal")
            .json(&patch);
        self.send(resource, "update", request).await?;
        Ok(())
    }

    async fn delete(&self, resource: Resource, filters: &[Filter]) -> Result<(), InfraError> {
        validate_request(resource, filters, None, "delete", true)?;
        let endpoint = self.table_endpoint(resource)?;
        let request = self
            .request(self.client.delete(endpoint), filters)
            .header("Prefer", "return=minimal");
        self.send(resource, "delete", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_endpoint_appends_rest_path() {
        let client = RestTableClient::new("https://demo.supabase.co", "anon-key").expect("client");
        assert_eq!(
            client
                .table_endpoint(Resource::LibraryTasks)
                .expect("endpoint")
                .as_str(),
            "https://demo.supabase.co/rest/v1/library_tasks"
        );

        let with_slash = RestTableClient::new("https://demo.supabase.co/", "anon-key").expect("client");
        assert_eq!(
            with_slash
                .table_endpoint(Resource::Blocks)
                .expect("endpoint")
                .as_str(),
            "https://demo.supabase.co/rest/v1/blocks"
        );
    }

    #[test]
    fn construction_requires_url_and_key() {
        assert!(matches!(
            RestTableClient::new("  ", "key"),
            Err(InfraError::InvalidConfig(_))
        ));
        assert!(matches!(
            RestTableClient::new("https://demo.supabase.co", ""),
            Err(InfraError::InvalidConfig(_))
        ));
        assert!(matches!(
            RestTableClient::new("not a url", "key"),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn filters_render_in_postgrest_syntax() {
        let params = filter_params(&[
            Filter::Eq("date", json!("2026-02-16")),
            Filter::id(9),
            Filter::In("block_id", vec![json!(1), json!(5)]),
            Filter::In("title", vec![json!("a,b")]),
            Filter::NotNull("time"),
            Filter::Eq("time", Value::Null),
        ]);
        assert_eq!(
            params,
            vec![
                ("date".to_string(), "eq.2026-02-16".to_string()),
                ("id".to_string(), "eq.9".to_string()),
                ("block_id".to_string(), "in.(1,5)".to_string()),
                ("title".to_string(), "in.(\"a,b\")".to_string()),
                ("time".to_string(), "not.is.null".to_string()),
                ("time".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn empty_response_bodies_parse_as_no_rows() {
        let rows = RestTableClient::parse_rows(Resource::Backlog, "  ").expect("empty body");
        assert!(rows.is_empty());
        let rows = RestTableClient::parse_rows(Resource::Backlog, r#"[{"id":1,"title":"Taxes"}]"#)
            .expect("rows");
        assert_eq!(rows[0].get("title"), Some(&json!("Taxes")));
        assert!(RestTableClient::parse_rows(Resource::Backlog, "{").is_err());
    }

    #[tokio::test]
    async fn unfiltered_delete_never_reaches_the_network() {
        let client = RestTableClient::new("http://127.0.0.1:9", "key").expect("client");
        let result = client.delete(Resource::Tasks, &[]).await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }
}
