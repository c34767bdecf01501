use crate::domain::models::{BacklogItem, NewBacklogItem, RecordId, normalize_title};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::table_client::{Filter, Resource, TableClient, insert_one, select_as};
use std::sync::Arc;
use tracing::debug;

pub struct BacklogService<C>
where
    C: TableClient + ?Sized,
{
    client: Arc<C>,
}

impl<C> BacklogService<C>
where
    C: TableClient + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<BacklogItem>, InfraError> {
        select_as(self.client.as_ref(), Resource::Backlog, &[]).await
    }

    pub async fn create(&self, title: &str) -> Result<Option<BacklogItem>, InfraError> {
        let Some(title) = normalize_title(title) else {
            debug!("blank backlog title ignored");
            return Ok(None);
        };
        let item: BacklogItem =
            insert_one(self.client.as_ref(), Resource::Backlog, &NewBacklogItem { title }).await?;
        debug!(backlog_id = item.id, "backlog item created");
        Ok(Some(item))
    }

    pub async fn delete(&self, item_id: RecordId) -> Result<(), InfraError> {
        self.client
            .delete(Resource::Backlog, &[Filter::id(item_id)])
            .await?;
        debug!(backlog_id = item_id, "backlog item deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::board::tests::RecordingClient;
    use proptest::prelude::*;

    #[tokio::test]
    async fn create_list_and_delete_items() {
        let client = Arc::new(RecordingClient::new());
        let backlog = BacklogService::new(client.clone());

        let taxes = backlog
            .create(" File taxes ")
            .await
            .expect("create")
            .expect("item");
        let books = backlog
            .create("Return library books")
            .await
            .expect("create")
            .expect("item");
        assert_eq!(taxes.title, "File taxes");
        assert_eq!(backlog.list().await.expect("list"), vec![taxes.clone(), books.clone()]);

        backlog.delete(taxes.id).await.expect("delete");
        assert_eq!(backlog.list().await.expect("list"), vec![books]);
    }

    #[tokio::test]
    async fn failed_insert_leaves_backlog_unchanged() {
        let client = Arc::new(RecordingClient::new());
        let backlog = BacklogService::new(client.clone());
        backlog.create("Keep").await.expect("create");

        client.fail_on("insert", Resource::Backlog);
        assert!(backlog.create("Lost").await.is_err());
        let titles = backlog
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|item| item.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Keep".to_string()]);
    }

    proptest! {
        #[test]
        fn blank_titles_issue_no_store_call(title in "[ \t\r\n]{0,12}") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            let client = Arc::new(RecordingClient::new());
            let backlog = BacklogService::new(client.clone());

            let created = runtime.block_on(backlog.create(&title)).expect("create");
            prop_assert_eq!(created, None);
            prop_assert!(client.calls().is_empty());
            prop_assert_eq!(client.inner.row_count(Resource::Backlog).expect("count"), 0);
        }
    }
}
