use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use super::types::{ContentEvent, MutationEvent, RevalidateEvent};
use crate::mutation::{MutationResponse, Operation};

/// In-process event bus backed by `tokio::broadcast`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ContentEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish to all current subscribers. Returns how many received it;
    /// having no listeners is not an error.
    pub fn publish(&self, event: ContentEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!("event dropped, no subscribers");
                0
            }
        }
    }

    /// Publish one [`MutationEvent`] per changed document.
    pub fn announce(&self, response: &MutationResponse) {
        let timestamp = Utc::now();
        for result in response
            .results
            .iter()
            .filter(|r| r.operation != Operation::None)
        {
            self.publish(ContentEvent::Mutation(MutationEvent {
                document_id: result.id.clone(),
                operation: result.operation,
                transaction_id: response.transaction_id.clone(),
                result_rev: result.rev.clone(),
                timestamp,
            }));
        }
    }

    pub fn revalidate<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        tracing::debug!(?paths, "revalidating");
        self.publish(ContentEvent::Revalidate(RevalidateEvent { paths }));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutationResult;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(ContentEvent::Welcome), 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ContentEvent::Welcome));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(ContentEvent::Welcome), 0);
    }

    #[tokio::test]
    async fn announce_skips_noops() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.announce(&MutationResponse {
            transaction_id: "tx1".into(),
            results: vec![
                MutationResult {
                    id: "agent-u1".into(),
                    operation: Operation::None,
                    rev: None,
                },
                MutationResult {
                    id: "lead1".into(),
                    operation: Operation::Create,
                    rev: Some("r1".into()),
                },
            ],
        });
        bus.revalidate(["/dashboard/leads"]);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                ContentEvent::Mutation(event) => {
                    assert_eq!(event.document_id, "lead1");
                    assert_eq!(event.transaction_id, "tx1");
                }
                other => panic!("unexpected event {other:?}"),
            }
            assert_eq!(
                rx.recv().await.unwrap(),
                ContentEvent::Revalidate(RevalidateEvent {
                    paths: vec!["/dashboard/leads".into()]
                })
            );
        }
    }
}
