//! Publishes domain events to NATS.

use uuid::Uuid;

use crate::domain::events::DomainEvent;

/// Fire-and-forget publisher. Without a NATS connection, events are only logged.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn subject(tenant_id: Uuid, event: &DomainEvent) -> String {
        format!("commerce.{}.{}", tenant_id, event.name())
    }

    /// Publishing failures are logged and never surface to the caller.
    pub async fn publish(&self, tenant_id: Uuid, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            let subject = Self::subject(tenant_id, &event);
            let Some(nats) = &self.nats else {
                tracing::debug!(%subject, "event raised (no broker configured)");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { tracing::error!(%subject, error = %e, "failed to serialise event"); continue; }
            };
            if let Err(e) = nats.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ReviewEvent;

    #[test]
    fn test_subject_includes_tenant_and_event() {
        let tenant = Uuid::nil();
        let e = DomainEvent::Review(ReviewEvent::Posted { review_id: tenant, product_id: tenant, rating: 5 });
        assert_eq!(EventPublisher::subject(tenant, &e), "commerce.00000000-0000-0000-0000-000000000000.review.posted");
    }

    #[tokio::test]
    async fn test_publish_without_broker_is_noop() {
        let e = DomainEvent::Review(ReviewEvent::Posted { review_id: Uuid::nil(), product_id: Uuid::nil(), rating: 3 });
        EventPublisher::default().publish(Uuid::nil(), vec![e]).await;
    }
}
