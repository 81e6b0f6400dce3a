//! Filtered, batched watch streams.
//!
//! Each consumer registers a [`WatcherSpec`]: a filter over objects, a
//! batching window, and one or more handlers. The watcher task delivers
//! the initial list once, then add/update/delete events debounced by the
//! batching window. A failed item is re-queued with exponential backoff
//! capped at [`RETRY_MAX`]; events are never dropped, so handlers must
//! be idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::watcher::{self, watcher, Event};
use kube::runtime::WatchStreamExt;
use kube::Resource;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use kage_core::Result;
use kage_xds::server::ShutdownSignal;

const RETRY_BASE: Duration = Duration::from_millis(250);
const RETRY_MAX: Duration = Duration::from_secs(30);
const MAX_PENDING: usize = 64;

/// Default debounce window between an event and its delivery.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(200);

/// Consumer callbacks for one watched kind.
#[async_trait]
pub trait EventHandler<K>: Send + Sync {
    /// The filtered initial list, delivered once per watch session.
    async fn on_initial(&self, _objects: &[K]) -> Result<()> {
        Ok(())
    }

    /// An object was added or updated.
    async fn on_apply(&self, object: &K) -> Result<()>;

    /// An object was deleted.
    async fn on_delete(&self, object: &K) -> Result<()>;
}

/// What one consumer wants out of a watch.
pub struct WatcherSpec<K> {
    filter: Box<dyn Fn(&K) -> bool + Send + Sync>,
    batch: Duration,
    handlers: Vec<Arc<dyn EventHandler<K>>>,
}

impl<K> Default for WatcherSpec<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> WatcherSpec<K> {
    /// A spec that passes every object with the default batch window.
    pub fn new() -> Self {
        Self {
            filter: Box::new(|_| true),
            batch: DEFAULT_BATCH_WINDOW,
            handlers: Vec::new(),
        }
    }

    /// Only deliver objects the predicate accepts.
    pub fn filter(mut self, filter: impl Fn(&K) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Debounce window before events are delivered.
    pub fn batch_window(mut self, batch: Duration) -> Self {
        self.batch = batch;
        self
    }

    /// Add a handler. Every handler sees every delivered event.
    pub fn handler(mut self, handler: Arc<dyn EventHandler<K>>) -> Self {
        self.handlers.push(handler);
        self
    }
}

struct Pending<K> {
    event: PendingEvent<K>,
    attempts: u32,
    not_before: Instant,
}

enum PendingEvent<K> {
    Apply(K),
    Delete(K),
}

impl<K> Pending<K> {
    fn apply(obj: K) -> Self {
        Self {
            event: PendingEvent::Apply(obj),
            attempts: 0,
            not_before: Instant::now(),
        }
    }

    fn delete(obj: K) -> Self {
        Self {
            event: PendingEvent::Delete(obj),
            attempts: 0,
            not_before: Instant::now(),
        }
    }
}

/// Spawn a watcher task for one kind.
///
/// The task runs until the shutdown signal resolves; watch errors are
/// logged and the underlying watcher restarts with backoff.
pub fn spawn_watcher<K>(
    api: Api<K>,
    spec: WatcherSpec<K>,
    shutdown: ShutdownSignal,
) -> JoinHandle<()>
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
{
    tokio::spawn(run_watcher(api, spec, shutdown))
}

async fn run_watcher<K>(api: Api<K>, spec: WatcherSpec<K>, shutdown: ShutdownSignal)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
{
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    let mut initial: Vec<K> = Vec::new();
    let mut pending: Vec<Pending<K>> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown.clone().wait() => break,
            _ = tokio::time::sleep(spec.batch), if !pending.is_empty() => {
                flush(&spec, &mut pending).await;
            }
            event = stream.next() => match event {
                Some(Ok(event)) => {
                    process_event(&spec, event, &mut initial, &mut pending).await;
                }
                Some(Err(err)) => warn!(error = %err, "watch stream error"),
                None => break,
            },
        }
    }
    debug!("watcher stopped");
}

/// Fold one watch event into the initial list or the pending queue,
/// dispatching where the event calls for it.
async fn process_event<K>(
    spec: &WatcherSpec<K>,
    event: Event<K>,
    initial: &mut Vec<K>,
    pending: &mut Vec<Pending<K>>,
) {
    match event {
        Event::Init => initial.clear(),
        Event::InitApply(obj) => {
            if (spec.filter)(&obj) {
                initial.push(obj);
            }
        }
        Event::InitDone => {
            let objects = std::mem::take(initial);
            debug!(count = objects.len(), "delivering initial list");
            deliver_initial(spec, &objects).await;
        }
        Event::Apply(obj) => {
            if (spec.filter)(&obj) {
                pending.push(Pending::apply(obj));
            }
        }
        Event::Delete(obj) => {
            if (spec.filter)(&obj) {
                pending.push(Pending::delete(obj));
            }
        }
    }
    if pending.len() >= MAX_PENDING {
        flush(spec, pending).await;
    }
}

/// Deliver the initial list, retrying a failing handler with backoff
/// until it accepts it. Restart reconciliation hangs off this list, so
/// it cannot be dropped.
async fn deliver_initial<K>(spec: &WatcherSpec<K>, objects: &[K]) {
    for handler in &spec.handlers {
        let mut attempts = 0;
        while let Err(err) = handler.on_initial(objects).await {
            attempts += 1;
            warn!(error = %err, attempts, "initial list handler failed, retrying");
            tokio::time::sleep(backoff_delay(attempts)).await;
        }
    }
}

/// Run every handler over the due items; a failed item goes back on the
/// queue with its backoff pushed out.
async fn flush<K>(spec: &WatcherSpec<K>, pending: &mut Vec<Pending<K>>) {
    let now = Instant::now();
    let (due, later): (Vec<_>, Vec<_>) =
        pending.drain(..).partition(|item| item.not_before <= now);
    *pending = later;

    for mut item in due {
        if let Err(err) = dispatch(spec, &item.event).await {
            item.attempts += 1;
            warn!(error = %err, attempts = item.attempts, "handler failed, requeueing");
            item.not_before = Instant::now() + backoff_delay(item.attempts);
            pending.push(item);
        }
    }
}

async fn dispatch<K>(spec: &WatcherSpec<K>, event: &PendingEvent<K>) -> Result<()> {
    for handler in &spec.handlers {
        match event {
            PendingEvent::Apply(obj) => handler.on_apply(obj).await?,
            PendingEvent::Delete(obj) => handler.on_delete(obj).await?,
        }
    }
    Ok(())
}

/// Exponential backoff from [`RETRY_BASE`], capped at [`RETRY_MAX`].
fn backoff_delay(attempts: u32) -> Duration {
    let exp = attempts.saturating_sub(1).min(7);
    std::cmp::min(RETRY_BASE * 2u32.pow(exp), RETRY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl Flaky {
        fn failing(fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_first,
            })
        }

        fn attempt(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(kage_core::Error::internal("transient"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EventHandler<String> for Flaky {
        async fn on_initial(&self, _objects: &[String]) -> Result<()> {
            self.attempt()
        }

        async fn on_apply(&self, _object: &String) -> Result<()> {
            self.attempt()
        }

        async fn on_delete(&self, _object: &String) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        initial: Mutex<Vec<String>>,
        applied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler<String> for Recorder {
        async fn on_initial(&self, objects: &[String]) -> Result<()> {
            self.initial.lock().unwrap().extend_from_slice(objects);
            Ok(())
        }

        async fn on_apply(&self, object: &String) -> Result<()> {
            self.applied.lock().unwrap().push(object.clone());
            Ok(())
        }

        async fn on_delete(&self, _object: &String) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initial_list_reaches_handlers() {
        let recorder = Arc::new(Recorder::default());
        let spec = WatcherSpec::new()
            .filter(|s: &String| s != "skip")
            .handler(recorder.clone());
        let mut initial = Vec::new();
        let mut pending = Vec::new();

        for event in [
            Event::Init,
            Event::InitApply("a".to_string()),
            Event::InitApply("skip".to_string()),
            Event::InitApply("b".to_string()),
            Event::InitDone,
        ] {
            process_event(&spec, event, &mut initial, &mut pending).await;
        }

        assert_eq!(*recorder.initial.lock().unwrap(), vec!["a", "b"]);
        assert!(initial.is_empty());
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delivery_retries_until_accepted() {
        let handler = Flaky::failing(3);
        let spec = WatcherSpec::new().handler(handler.clone());

        deliver_initial(&spec, &["x".to_string()]).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_event_requeues_until_success() {
        let handler = Flaky::failing(7);
        let spec = WatcherSpec::new().handler(handler.clone());
        let mut pending = vec![Pending::apply("x".to_string())];

        let mut rounds = 0;
        while !pending.is_empty() {
            rounds += 1;
            assert!(rounds < 32, "item should eventually clear");
            tokio::time::advance(RETRY_MAX).await;
            flush(&spec, &mut pending).await;
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_skips_items_still_backing_off() {
        let handler = Flaky::failing(1);
        let spec = WatcherSpec::new().handler(handler.clone());
        let mut pending = vec![Pending::apply("x".to_string())];

        flush(&spec, &mut pending).await;
        assert_eq!(pending.len(), 1, "failed item goes back on the queue");

        // Not due yet, so a second flush leaves it untouched.
        flush(&spec, &mut pending).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(RETRY_MAX).await;
        flush(&spec, &mut pending).await;
        assert!(pending.is_empty());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1), RETRY_BASE);
        assert_eq!(backoff_delay(2), RETRY_BASE * 2);
        assert!(backoff_delay(4) > backoff_delay(3));
        assert_eq!(backoff_delay(30), RETRY_MAX);
    }
}
