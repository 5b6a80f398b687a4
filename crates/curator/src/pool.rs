//! Bounded pool of depot client handles.
//!
//! The pool caps concurrent connections to the store independently of how
//! many worker tasks are running: workers contend for handles, which gives
//! natural admission control. A semaphore bounds the number of handles
//! checked out; an idle list reuses connections across units of work.

use crate::error::Result;
use depot::{ClientFactory, DepotClient};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type IdleList = Arc<Mutex<Vec<Arc<dyn DepotClient>>>>;

/// A fixed-size pool of store connections.
pub struct ClientPool {
    factory: Arc<dyn ClientFactory>,
    semaphore: Arc<Semaphore>,
    idle: IdleList,
    size: usize,
}

impl ClientPool {
    /// A pool that will hold at most `size` concurrent connections.
    /// Connections are made lazily, on first demand.
    pub fn new(factory: Arc<dyn ClientFactory>, size: usize) -> Self {
        let size = size.max(1);
        ClientPool {
            factory,
            semaphore: Arc::new(Semaphore::new(size)),
            idle: Arc::new(Mutex::new(Vec::with_capacity(size))),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Check out a handle, waiting until one is free if the pool is
    /// exhausted. An idle connection is reused when available; otherwise a
    /// new one is made, so a handle discarded as broken is replaced
    /// transparently here.
    pub async fn acquire(&self) -> Result<PooledClient> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore closed");
        let reusable = self.idle.lock().expect("pool mutex poisoned").pop();
        let client = match reusable {
            Some(client) => client,
            None => self.factory.connect().await?,
        };
        Ok(PooledClient {
            client: Some(client),
            idle: self.idle.clone(),
            _permit: permit,
        })
    }
}

/// A checked-out handle. Dropping it returns the connection to the pool;
/// [`PooledClient::discard`] drops the connection instead.
pub struct PooledClient {
    client: Option<Arc<dyn DepotClient>>,
    idle: IdleList,
    _permit: OwnedSemaphorePermit,
}

impl PooledClient {
    pub fn depot(&self) -> &dyn DepotClient {
        self.client.as_deref().expect("client already discarded")
    }

    /// Drop the underlying connection rather than returning it to the
    /// pool; used after a connection-level failure.
    pub fn discard(mut self) {
        self.client = None;
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.idle.lock().expect("pool mutex poisoned").push(client);
        }
    }
}
