use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use easypaies_core::EntityId;
use easypaies_events::{EntityScoped, EventBus, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic projection worker loop.
///
/// - Subscribes to an event bus before returning, so nothing published after
///   `spawn` is missed
/// - Applies an idempotent handler for each message
/// - Supports graceful shutdown
/// - Optional entity filtering
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a worker thread that processes events from the bus subscription.
    ///
    /// - `entity_id`: when provided, messages for other entities are ignored
    /// - `handler`: must be idempotent (at-least-once delivery safe)
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: &B,
        entity_id: Option<EntityId>,
        mut handler: H,
    ) -> std::io::Result<WorkerHandle>
    where
        M: EntityScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, entity_id, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    entity_id: Option<EntityId>,
    handler: &mut H,
) where
    M: EntityScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(100);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Some(e) = entity_id {
                    if msg.entity_id() != e {
                        continue;
                    }
                }

                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "projection worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use easypaies_core::AggregateId;
    use easypaies_events::{EventEnvelope, InMemoryEventBus};
    use uuid::Uuid;

    fn envelope(entity_id: EntityId) -> EventEnvelope<u32> {
        EventEnvelope::new(Uuid::now_v7(), entity_id, AggregateId::new(), "test", 1, 7)
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn filters_by_entity_and_shuts_down() {
        let bus = InMemoryEventBus::<EventEnvelope<u32>>::new();
        let mine = EntityId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let worker = ProjectionWorker::spawn("test-worker", &bus, Some(mine), move |env: EventEnvelope<u32>| {
            sink.lock().unwrap().push(env.entity_id());
            Ok::<(), ()>(())
        })
        .unwrap();

        bus.publish(envelope(EntityId::new())).unwrap();
        bus.publish(envelope(mine)).unwrap();

        wait_until(|| !seen.lock().unwrap().is_empty());
        worker.shutdown();
        assert_eq!(*seen.lock().unwrap(), vec![mine]);
    }
}
