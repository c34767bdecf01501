use crate::application::board::Placement;
use crate::domain::models::{
    Block, LibraryBlock, LibraryTask, NewBlock, NewLibraryBlock, NewLibraryTask, NewTask,
    RecordId, Task,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::table_client::{
    Filter, Resource, TableClient, insert_as, insert_one, select_as,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Result of a multi-step copy. `incomplete` names the step that failed
/// after `record` was already written; nothing is rolled back.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CopyOutcome<T> {
    pub record: T,
    pub copied_tasks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<String>,
}

impl<T> CopyOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }
}

pub struct LibraryService<C>
where
    C: TableClient + ?Sized,
{
    client: Arc<C>,
    placement: Placement,
}

impl<C> LibraryService<C>
where
    C: TableClient + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            placement: Placement::default(),
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub async fn list_templates(&self) -> Result<Vec<LibraryBlock>, InfraError> {
        select_as(self.client.as_ref(), Resource::LibraryBlocks, &[]).await
    }

    pub async fn list_template_tasks(
        &self,
        library_block_id: RecordId,
    ) -> Result<Vec<LibraryTask>, InfraError> {
        select_as(
            self.client.as_ref(),
            Resource::LibraryTasks,
            &[owner_filter(library_block_id)],
        )
        .await
    }

    pub async fn save_block_as_template(
        &self,
        block_id: RecordId,
    ) -> Result<CopyOutcome<LibraryBlock>, InfraError> {
        let block = select_as::<Block, C>(
            self.client.as_ref(),
            Resource::Blocks,
            &[Filter::id(block_id)],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| InfraError::NotFound(format!("block {block_id}")))?;
        let tasks: Vec<Task> = select_as(
            self.client.as_ref(),
            Resource::Tasks,
            &[owner_filter(block_id)],
        )
        .await?;

        let template: LibraryBlock = insert_one(
            self.client.as_ref(),
            Resource::LibraryBlocks,
            &NewLibraryBlock {
                title: block.title.clone(),
                color: block.color,
            },
        )
        .await?;

        let copies = tasks
            .iter()
            .map(|task| NewLibraryTask::from_task(task, template.id))
            .collect::<Vec<_>>();
        let outcome = match self
            .copy_tasks::<NewLibraryTask, LibraryTask>(Resource::LibraryTasks, &copies)
            .await
        {
            Ok(copied_tasks) => CopyOutcome {
                record: template,
                copied_tasks,
                incomplete: None,
            },
            Err(error) => {
                error!(
                    block_id,
                    library_block_id = template.id,
                    %error,
                    "template saved without its tasks"
                );
                CopyOutcome {
                    record: template,
                    copied_tasks: 0,
                    incomplete: Some(format!("copying tasks into the library failed: {error}")),
                }
            }
        };

        info!(
            block_id,
            library_block_id = outcome.record.id,
            copied_tasks = outcome.copied_tasks,
            "block saved to library"
        );
        Ok(outcome)
    }

    pub async fn instantiate_template(
        &self,
        library_block_id: RecordId,
        date: Option<NaiveDate>,
    ) -> Result<CopyOutcome<Block>, InfraError> {
        let template = select_as::<LibraryBlock, C>(
            self.client.as_ref(),
            Resource::LibraryBlocks,
            &[Filter::id(library_block_id)],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| InfraError::NotFound(format!("library block {library_block_id}")))?;

        let position = self.placement.next_position();
        let block: Block = insert_one(
            self.client.as_ref(),
            Resource::Blocks,
            &NewBlock {
                title: template.title.clone(),
                color: template.color,
                date: self.placement.date_or_today(date),
                x: position.x,
                y: position.y,
            },
        )
        .await?;

        let copied = match self.list_template_tasks(library_block_id).await {
            Ok(template_tasks) => {
                let copies = template_tasks
                    .iter()
                    .map(|task| NewTask::from_template(task, block.id))
                    .collect::<Vec<_>>();
                self.copy_tasks::<NewTask, Task>(Resource::Tasks, &copies)
                    .await
                    .map_err(|error| format!("copying template tasks failed: {error}"))
            }
            Err(error) => Err(format!("reading template tasks failed: {error}")),
        };

        let outcome = match copied {
            Ok(copied_tasks) => CopyOutcome {
                record: block,
                copied_tasks,
                incomplete: None,
            },
            Err(message) => {
                error!(
                    library_block_id,
                    block_id = block.id,
                    reason = %message,
                    "block created from template without its tasks"
                );
                CopyOutcome {
                    record: block,
                    copied_tasks: 0,
                    incomplete: Some(message),
                }
            }
        };

        info!(
            library_block_id,
            block_id = outcome.record.id,
            copied_tasks = outcome.copied_tasks,
            "template placed on board"
        );
        Ok(outcome)
    }

    pub async fn delete_template(&self, library_block_id: RecordId) -> Result<(), InfraError> {
        self.client
            .delete(Resource::LibraryTasks, &[owner_filter(library_block_id)])
            .await?;
        self.client
            .delete(Resource::LibraryBlocks, &[Filter::id(library_block_id)])
            .await?;
        info!(library_block_id, "template deleted");
        Ok(())
    }

    async fn copy_tasks<N, T>(&self, resource: Resource, copies: &[N]) -> Result<usize, InfraError>
    where
        N: Serialize,
        T: DeserializeOwned,
    {
        if copies.is_empty() {
            return Ok(0);
        }
        let inserted: Vec<T> = insert_as(self.client.as_ref(), resource, copies).await?;
        Ok(inserted.len())
    }
}

fn owner_filter(owner_id: RecordId) -> Filter {
    Filter::Eq("block_id", Value::from(owner_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::board::BoardService;
    use crate::application::board::tests::{RecordingClient, sample_date, stepping_placement};
    use crate::domain::models::BlockColor;

    fn services() -> (
        Arc<RecordingClient>,
        BoardService<RecordingClient>,
        LibraryService<RecordingClient>,
    ) {
        let client = Arc::new(RecordingClient::new());
        let placement = stepping_placement();
        let board = BoardService::new(client.clone()).with_placement(placement.clone());
        let library = LibraryService::new(client.clone()).with_placement(placement);
        (client, board, library)
    }

    async fn seeded_block(board: &BoardService<RecordingClient>) -> Block {
        let block = board
            .create_block("Morning routine", BlockColor::Green, None)
            .await
            .expect("create block")
            .expect("block");
        board
            .create_task(block.id, "Stretch", Some("7:00 AM"))
            .await
            .expect("task");
        board
            .create_task(block.id, "Journal", None)
            .await
            .expect("task");
        let done = board
            .create_task(block.id, "Water plants", Some("07:30"))
            .await
            .expect("task")
            .expect("created");
        board.toggle_task(done.id).await.expect("toggle");
        block
    }

    fn fields(tasks: &[Task]) -> Vec<(String, Option<String>, bool)> {
        tasks
            .iter()
            .map(|task| (task.title.clone(), task.time.clone(), task.completed))
            .collect()
    }

    #[tokio::test]
    async fn save_then_instantiate_copies_block_and_tasks() {
        let (_, board, library) = services();
        let original = seeded_block(&board).await;
        let original_tasks = board.list_tasks(original.id).await.expect("tasks");

        let saved = library
            .save_block_as_template(original.id)
            .await
            .expect("save template");
        assert!(saved.is_complete());
        assert_eq!(saved.copied_tasks, 3);
        assert_eq!(saved.record.title, original.title);
        assert_eq!(saved.record.color, original.color);
        assert_eq!(
            library
                .list_template_tasks(saved.record.id)
                .await
                .expect("template tasks")
                .len(),
            3
        );

        let other_day = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let placed = library
            .instantiate_template(saved.record.id, Some(other_day))
            .await
            .expect("instantiate");
        assert!(placed.is_complete());
        assert_eq!(placed.copied_tasks, 3);

        let block = placed.record;
        assert_ne!(block.id, original.id);
        assert_ne!(block.position(), original.position());
        assert_eq!(block.title, original.title);
        assert_eq!(block.color, original.color);
        assert_eq!(block.date, other_day);

        let copied_tasks = board.list_tasks(block.id).await.expect("copied tasks");
        assert_eq!(fields(&copied_tasks), fields(&original_tasks));
        assert!(copied_tasks.iter().all(|task| task.block_id == block.id));
        assert_eq!(board.list_tasks(original.id).await.expect("tasks").len(), 3);
    }

    #[tokio::test]
    async fn instantiate_defaults_to_today() {
        let (_, board, library) = services();
        let original = seeded_block(&board).await;
        let saved = library
            .save_block_as_template(original.id)
            .await
            .expect("save");
        let placed = library
            .instantiate_template(saved.record.id, None)
            .await
            .expect("instantiate");
        assert_eq!(placed.record.date, sample_date());
    }

    #[tokio::test]
    async fn empty_blocks_skip_the_bulk_insert() {
        let (client, board, library) = services();
        let block = board
            .create_block("Empty", BlockColor::Red, None)
            .await
            .expect("create")
            .expect("block");
        client.clear_calls();

        let saved = library.save_block_as_template(block.id).await.expect("save");
        assert_eq!(saved.copied_tasks, 0);
        assert!(
            !client
                .calls()
                .contains(&("insert".to_string(), Resource::LibraryTasks))
        );
    }

    #[tokio::test]
    async fn failed_task_copy_keeps_the_new_block_and_reports_incomplete() {
        let (client, board, library) = services();
        let original = seeded_block(&board).await;
        let saved = library
            .save_block_as_template(original.id)
            .await
            .expect("save");

        client.fail_on("insert", Resource::Tasks);
        let placed = library
            .instantiate_template(saved.record.id, None)
            .await
            .expect("block still returned");
        assert!(!placed.is_complete());
        assert_eq!(placed.copied_tasks, 0);
        assert!(
            placed
                .incomplete
                .as_deref()
                .is_some_and(|message| message.contains("copying template tasks"))
        );
        assert_eq!(
            board.get_block(placed.record.id).await.expect("block kept"),
            placed.record
        );
        assert!(board.list_tasks(placed.record.id).await.expect("tasks").is_empty());
    }

    #[tokio::test]
    async fn unreadable_template_tasks_keep_the_new_block() {
        let (client, board, library) = services();
        let original = seeded_block(&board).await;
        let saved = library
            .save_block_as_template(original.id)
            .await
            .expect("save");

        client.fail_on("select", Resource::LibraryTasks);
        let placed = library
            .instantiate_template(saved.record.id, None)
            .await
            .expect("block still returned");
        assert!(!placed.is_complete());
        assert_eq!(placed.copied_tasks, 0);
        assert!(
            placed
                .incomplete
                .as_deref()
                .is_some_and(|message| message.contains("reading template tasks"))
        );
        assert_eq!(
            board.get_block(placed.record.id).await.expect("block kept"),
            placed.record
        );
        assert!(board.list_tasks(placed.record.id).await.expect("tasks").is_empty());
    }

    #[tokio::test]
    async fn failed_library_task_insert_keeps_the_template() {
        let (client, board, library) = services();
        let original = seeded_block(&board).await;

        client.fail_on("insert", Resource::LibraryTasks);
        let saved = library
            .save_block_as_template(original.id)
            .await
            .expect("template still returned");
        assert!(!saved.is_complete());
        assert_eq!(library.list_templates().await.expect("templates").len(), 1);
    }

    #[tokio::test]
    async fn missing_sources_are_not_found() {
        let (client, _, library) = services();
        assert!(matches!(
            library.save_block_as_template(99).await,
            Err(InfraError::NotFound(_))
        ));
        assert!(matches!(
            library.instantiate_template(99, None).await,
            Err(InfraError::NotFound(_))
        ));
        assert!(
            client
                .calls()
                .iter()
                .all(|(operation, _)| operation == "select")
        );
    }

    #[tokio::test]
    async fn delete_template_removes_library_tasks_first() {
        let (client, board, library) = services();
        let original = seeded_block(&board).await;
        let saved = library
            .save_block_as_template(original.id)
            .await
            .expect("save");
        client.clear_calls();

        library
            .delete_template(saved.record.id)
            .await
            .expect("delete template");
        assert_eq!(
            client.calls(),
            vec![
                ("delete".to_string(), Resource::LibraryTasks),
                ("delete".to_string(), Resource::LibraryBlocks),
            ]
        );
        assert!(library.list_templates().await.expect("templates").is_empty());
        assert!(
            library
                .list_template_tasks(saved.record.id)
                .await
                .expect("tasks")
                .is_empty()
        );
    }
}
