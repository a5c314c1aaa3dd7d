use actix_web::web::Bytes;
use futures_util::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::OrderResponse;

/// Buffered notifications per listener before the slowest one starts skipping.
pub const NOTIFICATION_CAPACITY: usize = 64;

/// Realtime events pushed to the back office.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A customer placed an order; carries the order with its items.
    NewOrder(OrderResponse),
}

impl Notification {
    pub fn event(&self) -> &'static str {
        match self {
            Notification::NewOrder(_) => "new:order",
        }
    }

    /// One server-sent-events frame: `event:` line, JSON `data:` line, blank line.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let data = match self {
            Notification::NewOrder(order) => serde_json::to_string(order)?,
        };
        Ok(format!("event: {}\ndata: {}\n\n", self.event(), data))
    }
}

/// Fan-out of notifications to every connected listener.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Returns how many listeners got the notification. Nobody listening is fine.
    pub fn publish(&self, notification: Notification) -> usize {
        let event = notification.event();
        match self.sender.send(notification) {
            Ok(listeners) => {
                log::debug!("Published {event} to {listeners} listener(s)");
                listeners
            }
            Err(_) => 0,
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NOTIFICATION_CAPACITY)
    }
}

/// SSE body for one listener. Ends when every `Notifier` handle is gone.
pub fn notification_stream(
    receiver: broadcast::Receiver<Notification>,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    futures_util::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(notification) => match notification.to_frame() {
                    Ok(frame) => return Some((Ok(Bytes::from(frame)), receiver)),
                    Err(e) => log::error!("Failed to encode {}: {e}", notification.event()),
                },
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Notification listener lagged, skipped {skipped}");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;
    use futures_util::StreamExt;
    use rust_decimal::Decimal;

    fn order(id: i64) -> OrderResponse {
        OrderResponse {
            id,
            user_id: 2,
            status: OrderStatus::Pending,
            subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            qty_items: 0,
            items: Vec::new(),
            discounts: Vec::new(),
            user: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_publish_without_listeners() {
        let notifier = Notifier::default();
        assert_eq!(notifier.publish(Notification::NewOrder(order(1))), 0);
    }

    #[test]
    fn test_frame() {
        let frame = Notification::NewOrder(order(7)).to_frame().unwrap();
        assert!(frame.starts_with("event: new:order\ndata: {"));
        assert!(frame.contains(r#""id":7"#));
        assert!(frame.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_stream_delivers_then_ends() {
        let notifier = Notifier::new(4);
        let stream = notification_stream(notifier.subscribe());

        assert_eq!(notifier.publish(Notification::NewOrder(order(3))), 1);
        assert_eq!(notifier.publish(Notification::NewOrder(order(4))), 1);
        drop(notifier);

        let frames: Vec<String> = stream
            .map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
            .collect()
            .await;
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains(r#""id":3"#));
        assert!(frames[1].contains(r#""id":4"#));
    }

    #[tokio::test]
    async fn test_lagging_listener_skips_oldest() {
        let notifier = Notifier::new(1);
        let stream = notification_stream(notifier.subscribe());

        notifier.publish(Notification::NewOrder(order(1)));
        notifier.publish(Notification::NewOrder(order(2)));
        drop(notifier);

        let frames: Vec<_> = stream.collect().await;
        assert_eq!(frames.len(), 1);
        let body = String::from_utf8(frames[0].as_ref().unwrap().to_vec()).unwrap();
        assert!(body.contains(r#""id":2"#));
    }
}
