use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use homefind_core::events::ContentEvent;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/listen", get(listen))
}

/// The SSE frame for `event`, or `None` for events the public stream omits.
fn to_sse(event: &ContentEvent) -> Option<Event> {
    if !event.is_public() {
        return None;
    }
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode content event");
            None
        }
    }
}

/// Server-sent stream of page revalidations, starting with `welcome`.
async fn listen(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = state.caps().events.subscribe();

    let stream = async_stream::stream! {
        if let Some(welcome) = to_sse(&ContentEvent::Welcome) {
            yield Ok(welcome);
        }
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event) {
                        yield Ok(sse);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "listener fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use homefind_core::events::{MutationEvent, RevalidateEvent};
    use homefind_core::mutation::Operation;

    use super::*;

    #[test]
    fn stream_carries_revalidations_but_not_document_ids() {
        let mutation = ContentEvent::Mutation(MutationEvent {
            document_id: "user-b1".into(),
            operation: Operation::Update,
            transaction_id: "tx".into(),
            result_rev: Some("r1".into()),
            timestamp: Utc::now(),
        });
        assert!(to_sse(&mutation).is_none());

        let revalidate = ContentEvent::Revalidate(RevalidateEvent {
            paths: vec!["/saved".into()],
        });
        assert!(to_sse(&revalidate).is_some());
        assert!(to_sse(&ContentEvent::Welcome).is_some());
    }
}
