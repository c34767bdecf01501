use crate::domain::models::{
    Block, BlockColor, NewBlock, NewTask, Position, RecordId, Task, TaskEdit, normalize_time,
    normalize_title,
};
use crate::domain::time_format::{clock_minutes, format_time};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::table_client::{
    Filter, Resource, TableClient, insert_one, select_as, to_row,
};
use chrono::{Local, NaiveDate};
use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

pub type PositionProvider = Arc<dyn Fn() -> Position + Send + Sync>;
pub type TodayProvider = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub const DEFAULT_SPAWN_SPREAD: i32 = 100;

#[derive(Clone)]
pub struct Placement {
    position_provider: PositionProvider,
    today_provider: TodayProvider,
}

impl Placement {
    /// Offsets drawn uniformly from `[-spread, spread)` on both axes. Draws are
    /// independent, so two blocks may land on the same position.
    pub fn random(spread: i32) -> Self {
        let spread = spread.max(2);
        Self {
            position_provider: Arc::new(move || {
                let mut rng = rand::rng();
                Position {
                    x: rng.random_range(-spread..spread),
                    y: rng.random_range(-spread..spread),
                }
            }),
            today_provider: Arc::new(|| Local::now().date_naive()),
        }
    }

    pub fn with_position_provider(mut self, position_provider: PositionProvider) -> Self {
        self.position_provider = position_provider;
        self
    }

    pub fn with_today_provider(mut self, today_provider: TodayProvider) -> Self {
        self.today_provider = today_provider;
        self
    }

    pub fn next_position(&self) -> Position {
        (self.position_provider)()
    }

    pub fn date_or_today(&self, date: Option<NaiveDate>) -> NaiveDate {
        date.unwrap_or_else(|| (self.today_provider)())
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::random(DEFAULT_SPAWN_SPREAD)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyLogEntry {
    pub task: Task,
    pub color: BlockColor,
    pub display_time: String,
}

pub struct BoardService<C>
where
    C: TableClient + ?Sized,
{
    client: Arc<C>,
    placement: Placement,
}

impl<C> BoardService<C>
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

    pub async fn list_blocks(&self, date: NaiveDate) -> Result<Vec<Block>, InfraError> {
        select_as(self.client.as_ref(), Resource::Blocks, &[date_filter(date)]).await
    }

    pub async fn get_block(&self, block_id: RecordId) -> Result<Block, InfraError> {
        select_as::<Block, C>(self.client.as_ref(), Resource::Blocks, &[Filter::id(block_id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| InfraError::NotFound(format!("block {block_id}")))
    }

    pub async fn create_block(
        &self,
        title: &str,
        color: BlockColor,
        date: Option<NaiveDate>,
    ) -> Result<Option<Block>, InfraError> {
        let Some(title) = normalize_title(title) else {
            debug!("blank block title ignored");
            return Ok(None);
        };
        let position = self.placement.next_position();
        let record = NewBlock {
            title,
            color,
            date: self.placement.date_or_today(date),
            x: position.x,
            y: position.y,
        };
        let block: Block = insert_one(self.client.as_ref(), Resource::Blocks, &record).await?;
        info!(block_id = block.id, date = %block.date, "block created");
        Ok(Some(block))
    }

    pub async fn update_block_position(
        &self,
        block_id: RecordId,
        x: f64,
        y: f64,
    ) -> Result<Position, InfraError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(InfraError::InvalidInput(format!(
                "block position must be finite, got ({x}, {y})"
            )));
        }
        let position = Position::from_drag(x, y);
        let patch = to_row(&json!({ "x": position.x, "y": position.y }))?;
        self.client
            .update(Resource::Blocks, &[Filter::id(block_id)], patch)
            .await?;
        debug!(block_id, x = position.x, y = position.y, "block moved");
        Ok(position)
    }

    /// Removes the block's tasks, then the block. A failure after the first
    /// step leaves an empty block behind.
    pub async fn delete_block(&self, block_id: RecordId) -> Result<(), InfraError> {
        self.client
            .delete(Resource::Tasks, &[block_filter(block_id)])
            .await?;
        self.client
            .delete(Resource::Blocks, &[Filter::id(block_id)])
            .await?;
        info!(block_id, "block deleted");
        Ok(())
    }

    pub async fn list_tasks(&self, block_id: RecordId) -> Result<Vec<Task>, InfraError> {
        select_as(self.client.as_ref(), Resource::Tasks, &[block_filter(block_id)]).await
    }

    pub async fn get_task(&self, task_id: RecordId) -> Result<Task, InfraError> {
        select_as::<Task, C>(self.client.as_ref(), Resource::Tasks, &[Filter::id(task_id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| InfraError::NotFound(format!("task {task_id}")))
    }

    pub async fn create_task(
        &self,
        block_id: RecordId,
        title: &str,
        time: Option<&str>,
    ) -> Result<Option<Task>, InfraError> {
        let Some(title) = normalize_title(title) else {
            debug!(block_id, "blank task title ignored");
            return Ok(None);
        };
        let record = NewTask {
            block_id,
            title,
            time: normalize_time(time),
            completed: false,
        };
        let task: Task = insert_one(self.client.as_ref(), Resource::Tasks, &record).await?;
        debug!(task_id = task.id, block_id, "task created");
        Ok(Some(task))
    }

    pub async fn update_task(
        &self,
        task_id: RecordId,
        title: &str,
        time: Option<&str>,
    ) -> Result<Option<Task>, InfraError> {
        let Some(title) = normalize_title(title) else {
            debug!(task_id, "blank task title ignored");
            return Ok(None);
        };
        let edit = TaskEdit {
            title,
            time: normalize_time(time),
        };
        self.client
            .update(Resource::Tasks, &[Filter::id(task_id)], to_row(&edit)?)
            .await?;
        self.get_task(task_id).await.map(Some)
    }

    pub async fn toggle_task(&self, task_id: RecordId) -> Result<Task, InfraError> {
        let mut task = self.get_task(task_id).await?;
        task.completed = !task.completed;
        let patch = to_row(&json!({ "completed": task.completed }))?;
        self.client
            .update(Resource::Tasks, &[Filter::id(task_id)], patch)
            .await?;
        debug!(task_id, completed = task.completed, "task toggled");
        Ok(task)
    }

    pub async fn delete_task(&self, task_id: RecordId) -> Result<(), InfraError> {
        self.client
            .delete(Resource::Tasks, &[Filter::id(task_id)])
            .await?;
        debug!(task_id, "task deleted");
        Ok(())
    }

    pub async fn daily_log(&self, date: NaiveDate) -> Result<Vec<DailyLogEntry>, InfraError> {
        let blocks = self.list_blocks(date).await?;
        if blocks.is_empty() {
            return Ok(Vec::new());
        }

        let block_ids = blocks.iter().map(|block| Value::from(block.id)).collect();
        let mut tasks: Vec<Task> = select_as(
            self.client.as_ref(),
            Resource::Tasks,
            &[Filter::In("block_id", block_ids), Filter::NotNull("time")],
        )
        .await?;
        // Unparseable times sort after every real clock time.
        tasks.sort_by_key(|task| {
            task.time
                .as_deref()
                .and_then(clock_minutes)
                .unwrap_or(u32::MAX)
        });

        Ok(tasks
            .into_iter()
            .map(|task| {
                let color = blocks
                    .iter()
                    .find(|block| block.id == task.block_id)
                    .map(|block| block.color)
                    .unwrap_or(BlockColor::Unknown);
                let display_time = task.time.as_deref().map(format_time).unwrap_or_default();
                DailyLogEntry {
                    task,
                    color,
                    display_time,
                }
            })
            .collect())
    }
}

fn date_filter(date: NaiveDate) -> Filter {
    Filter::Eq("date", Value::from(date.format("%Y-%m-%d").to_string()))
}

fn block_filter(block_id: RecordId) -> Filter {
    Filter::Eq("block_id", Value::from(block_id))
}
