//! Debounced cloud pushes on the browser event loop.
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use zora_progress::{
    ProgressSnapshot, PushDebouncer, PushScheduler, RemoteTransport, SyncClient, SyncId,
};

use crate::dom;

/// Each change arms a `setTimeout`; timers that wake up after a newer change
/// find their ticket stale and do nothing.
pub struct WebAutoSync<T: RemoteTransport + 'static> {
    client: Rc<SyncClient<T>>,
    debouncer: Rc<RefCell<PushDebouncer>>,
}

impl<T: RemoteTransport + 'static> WebAutoSync<T> {
    pub fn new(client: Rc<SyncClient<T>>, window: Duration) -> Self {
        Self {
            client,
            debouncer: Rc::new(RefCell::new(PushDebouncer::new(window))),
        }
    }
}

impl<T: RemoteTransport + 'static> PushScheduler for WebAutoSync<T> {
    fn schedule_push(&self, snapshot: ProgressSnapshot, sync_id: SyncId) {
        let ticket = self.debouncer.borrow_mut().schedule(snapshot, sync_id);
        let delay = self.debouncer.borrow().window();
        let debouncer = Rc::clone(&self.debouncer);
        let client = Rc::clone(&self.client);
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = dom::sleep(delay).await {
                log::warn!("Cloud sync timer failed: {}", dom::js_error_message(&err));
                return;
            }
            let due = debouncer.borrow_mut().take_due(ticket);
            if let Some(push) = due {
                client.push(&push.snapshot, &push.sync_id).await;
            }
        });
    }

    fn cancel_pending(&self) {
        self.debouncer.borrow_mut().cancel();
    }
}
