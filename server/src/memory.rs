//! In-memory implementation of the storage gateway.
//!
//! Backs the test suites; also usable for running the server against no
//! external services. Bulk-insert calls are counted, and a failure point can
//! be injected to exercise the importer's fail-fast path.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{NewTicket, Ticket, User};
use crate::storage::{StorageError, TicketStore, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    tickets: Mutex<Vec<Ticket>>,
    users: Mutex<Vec<User>>,
    batch_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    fail_from_batch: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose bulk inserts fail starting at the given 1-based call.
    pub fn failing_from_batch(call: usize) -> Self {
        Self {
            fail_from_batch: Some(call),
            ..Self::default()
        }
    }

    /// Number of bulk-insert calls issued so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Sizes of the bulk-insert calls, in submission order.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().await.clone()
    }

    pub async fn seed_users(&self, users: Vec<User>) {
        self.users.lock().await.extend(users);
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Ticket>, StorageError> {
        Ok(self.tickets.lock().await.clone())
    }

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StorageError> {
        let ticket = ticket.with_id(Uuid::new_v4().to_string());
        self.tickets.lock().await.push(ticket.clone());

        Ok(ticket)
    }

    async fn insert_batch(&self, tickets: Vec<NewTicket>) -> Result<(), StorageError> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.lock().await.push(tickets.len());

        if self.fail_from_batch.is_some_and(|from| call >= from) {
            return Err(StorageError::Rejected(format!("bulk call {call} refused")));
        }

        let mut stored = self.tickets.lock().await;
        stored.extend(
            tickets
                .into_iter()
                .map(|ticket| ticket.with_id(Uuid::new_v4().to_string())),
        );

        Ok(())
    }

    async fn update(&self, id: &str, fields: NewTicket) -> Result<Option<Ticket>, StorageError> {
        let mut stored = self.tickets.lock().await;

        match stored.iter_mut().find(|ticket| ticket.id == id) {
            Some(slot) => {
                *slot = fields.with_id(id.to_string());
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.tickets.lock().await.retain(|ticket| ticket.id != id);

        Ok(())
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Ticket>, StorageError> {
        Ok(self
            .tickets
            .lock()
            .await
            .iter()
            .find(|ticket| ticket.barcode == barcode)
            .cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.users.lock().await.clone())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }
}
