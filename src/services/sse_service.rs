use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use tokio::{
    sync::mpsc::{self, WeakSender, error::TrySendError},
    task::JoinHandle,
    time::{Instant, interval_at},
};
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    services::sse_events::{connected_event, heartbeat_event},
    state::{DeliveryError, SharedState, SubscriptionId, Topic},
};

/// Tears a connection down when the response stream is dropped.
///
/// Owned by the stream itself, so the cleanup runs once whether the client closed the
/// socket, the network failed, or the hub dropped the subscriber.
struct ConnectionGuard {
    state: SharedState,
    topic: Topic,
    subscription: SubscriptionId,
    heartbeat: JoinHandle<()>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.heartbeat.abort();
        self.state.hub(self.topic).unsubscribe(self.subscription);
        info!(
            topic = self.topic.as_str(),
            subscription = %self.subscription,
            "SSE stream disconnected"
        );
    }
}

/// Open a subscription on `topic` and expose it as a stream of events.
///
/// The first item is always the `connected` acknowledgement. The stream ends when the
/// hub drops the subscriber or the heartbeat cannot be delivered.
///
/// The acknowledgement is built and the subscriber registered under the command gate.
/// Transitions publish and broadcast under the same gate, so none can land between the
/// snapshot read and the subscription.
pub async fn subscribe_stream(
    state: SharedState,
    topic: Topic,
) -> impl Stream<Item = ServerEvent> + Send {
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config().stream_buffer.max(1));
    let heartbeat_tx = tx.downgrade();

    let subscription = {
        let _gate = state.lock_phase().await;
        if let Some(event) = connected_event(&state, topic) {
            let _ = tx.try_send(event);
        }

        // The hub callback owns the only strong sender; removing it closes the stream.
        state.hub(topic).subscribe(move |event: &ServerEvent| {
            tx.try_send(event.clone()).map_err(|err| match err {
                TrySendError::Full(_) => DeliveryError::Backpressure,
                TrySendError::Closed(_) => DeliveryError::Disconnected,
            })
        })
    };

    let heartbeat = spawn_heartbeat(&state, topic, subscription, heartbeat_tx);
    let guard = ConnectionGuard {
        state,
        topic,
        subscription,
        heartbeat,
    };
    info!(topic = topic.as_str(), subscription = %subscription, "new SSE connection");

    async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield event;
        }
    }
}

/// Convert an event stream into an SSE response using `data: <json>` frames.
pub fn to_sse_response<S>(events: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ServerEvent> + Send + 'static,
{
    Sse::new(events.map(|event| Ok(Event::default().data(&*event.data))))
}

fn spawn_heartbeat(
    state: &SharedState,
    topic: Topic,
    subscription: SubscriptionId,
    sender: WeakSender<ServerEvent>,
) -> JoinHandle<()> {
    let state = SharedState::clone(state);
    let period = state.config().heartbeat_interval;

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;

            let Some(tx) = sender.upgrade() else {
                break;
            };
            let Some(event) = heartbeat_event() else {
                continue;
            };

            if let Err(err) = tx.try_send(event) {
                debug!(
                    topic = topic.as_str(),
                    subscription = %subscription,
                    error = %err,
                    "heartbeat delivery failed; closing subscription"
                );
                state.hub(topic).unsubscribe(subscription);
                break;
            }
        }
    })
}
