//! Tokio driver for debounced pushes.
//!
//! Tasks are spawned with `spawn_local`, so the scheduler must be used from
//! inside a `tokio::task::LocalSet`.
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{ProgressSnapshot, PushDebouncer, PushScheduler, RemoteTransport, SyncClient, SyncId};

pub struct AutoSync<T: RemoteTransport + 'static> {
    client: Rc<SyncClient<T>>,
    debouncer: Rc<RefCell<PushDebouncer>>,
    timer: RefCell<Option<JoinHandle<()>>>,
}

impl<T: RemoteTransport + 'static> AutoSync<T> {
    pub fn new(client: Rc<SyncClient<T>>, window: Duration) -> Self {
        Self {
            client,
            debouncer: Rc::new(RefCell::new(PushDebouncer::new(window))),
            timer: RefCell::new(None),
        }
    }

    pub fn client(&self) -> &Rc<SyncClient<T>> {
        &self.client
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.borrow().is_pending()
    }

    /// Stop a timer that is still sleeping. A push already in flight is left
    /// to finish.
    fn abort_timer(&self) {
        let handle = self.timer.borrow_mut().take();
        if let Some(handle) = handle
            && self.debouncer.borrow().is_pending()
        {
            handle.abort();
        }
    }
}

impl<T: RemoteTransport + 'static> PushScheduler for AutoSync<T> {
    fn schedule_push(&self, snapshot: ProgressSnapshot, sync_id: SyncId) {
        self.abort_timer();
        let ticket = self.debouncer.borrow_mut().schedule(snapshot, sync_id);
        let window = self.debouncer.borrow().window();
        let debouncer = Rc::clone(&self.debouncer);
        let client = Rc::clone(&self.client);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(window).await;
            let due = debouncer.borrow_mut().take_due(ticket);
            if let Some(push) = due {
                client.push(&push.snapshot, &push.sync_id).await;
            }
        });
        *self.timer.borrow_mut() = Some(handle);
    }

    fn cancel_pending(&self) {
        self.abort_timer();
        self.debouncer.borrow_mut().cancel();
    }
}
