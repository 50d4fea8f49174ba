//! Storage gateway for ticket and user documents.
//!
//! The traits keep the pipeline and routes independent of the backend; the
//! production implementation talks to Meilisearch, tests use
//! [`crate::memory::MemoryStore`].

use std::sync::Arc;

use async_trait::async_trait;
use meilisearch_sdk::{
    client::Client,
    documents::DocumentsQuery,
    errors::{Error as MeiliError, ErrorCode},
    settings::Settings,
    task_info::TaskInfo,
};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewTicket, Ticket, User};

pub const TICKET_INDEX: &str = "tickets";
pub const TICKET_ID: &str = "id";
pub const TICKET_BARCODE: &str = "barcode";
pub const USER_INDEX: &str = "users";

/// Listing cap for the document endpoints; the backend paginates listings.
pub const LIST_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("document store error: {0}")]
    Backend(#[from] MeiliError),

    #[error("document store rejected the operation: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Ticket>, StorageError>;

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StorageError>;

    /// Inserts one batch as a single bulk call; the call succeeds or fails as
    /// a unit. Callers never retry.
    async fn insert_batch(&self, tickets: Vec<NewTicket>) -> Result<(), StorageError>;

    /// Full-record replace. `None` when the id is unknown.
    async fn update(&self, id: &str, fields: NewTicket) -> Result<Option<Ticket>, StorageError>;

    /// Idempotent; deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Ticket>, StorageError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, StorageError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;
}

pub struct MeiliStore {
    client: Arc<Client>,
}

impl MeiliStore {
    /// Connects and applies the ticket index settings.
    pub async fn connect(url: &str, api_key: Option<&str>) -> Result<Self, StorageError> {
        let client = Arc::new(Client::new(url, api_key)?);

        let settings = Settings::new().with_filterable_attributes([TICKET_BARCODE]);
        client.index(TICKET_INDEX).set_settings(&settings).await?;

        Ok(Self { client })
    }

    async fn wait_applied(&self, task: TaskInfo) -> Result<(), StorageError> {
        let task = task.wait_for_completion(&self.client, None, None).await?;

        if task.is_failure() {
            return Err(StorageError::Rejected(task.unwrap_failure().to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl TicketStore for MeiliStore {
    async fn list(&self) -> Result<Vec<Ticket>, StorageError> {
        let index = self.client.index(TICKET_INDEX);
        let documents = DocumentsQuery::new(&index)
            .with_limit(LIST_LIMIT)
            .execute::<Ticket>()
            .await?;

        Ok(documents.results)
    }

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StorageError> {
        let ticket = ticket.with_id(Uuid::new_v4().to_string());

        let task = self
            .client
            .index(TICKET_INDEX)
            .add_documents(&[ticket.clone()], Some(TICKET_ID))
            .await?;
        self.wait_applied(task).await?;

        Ok(ticket)
    }

    async fn insert_batch(&self, tickets: Vec<NewTicket>) -> Result<(), StorageError> {
        let documents: Vec<Ticket> = tickets
            .into_iter()
            .map(|ticket| ticket.with_id(Uuid::new_v4().to_string()))
            .collect();

        let task = self
            .client
            .index(TICKET_INDEX)
            .add_documents(&documents, Some(TICKET_ID))
            .await?;

        self.wait_applied(task).await
    }

    async fn update(&self, id: &str, fields: NewTicket) -> Result<Option<Ticket>, StorageError> {
        match self.client.index(TICKET_INDEX).get_document::<Ticket>(id).await {
            Ok(_) => {}
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let ticket = fields.with_id(id.to_string());
        let task = self
            .client
            .index(TICKET_INDEX)
            .add_or_replace(&[ticket.clone()], Some(TICKET_ID))
            .await?;
        self.wait_applied(task).await?;

        Ok(Some(ticket))
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let task = self.client.index(TICKET_INDEX).delete_document(id).await?;

        self.wait_applied(task).await
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Ticket>, StorageError> {
        let index = self.client.index(TICKET_INDEX);

        let escaped = barcode.replace('"', "\\\"");
        let filter = format!("{TICKET_BARCODE} = \"{escaped}\"");

        let results = index
            .search()
            .with_filter(&filter)
            .with_limit(1)
            .execute::<Ticket>()
            .await?;

        Ok(results.hits.into_iter().next().map(|hit| hit.result))
    }
}

#[async_trait]
impl UserStore for MeiliStore {
    async fn list(&self) -> Result<Vec<User>, StorageError> {
        let index = self.client.index(USER_INDEX);
        let documents = DocumentsQuery::new(&index)
            .with_limit(LIST_LIMIT)
            .execute::<User>()
            .await?;

        Ok(documents.results)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        match self.client.index(USER_INDEX).get_document::<User>(username).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

fn is_not_found(err: &MeiliError) -> bool {
    matches!(
        err,
        MeiliError::Meilisearch(e)
            if matches!(e.error_code, ErrorCode::DocumentNotFound | ErrorCode::IndexNotFound)
    )
}
