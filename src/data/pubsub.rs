use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use serde::{Deserialize, Serialize};
use log::{info, debug, error};

use crate::data::parser::StockRecord;
use crate::error::SubscriptionError;

pub const STOCKS_TOPIC: &str = "/topic/stocks";

#[derive(Debug, Deserialize, Serialize)]
pub struct SubscriptionMessage {
    pub action: String, // "subscribe" | "unsubscribe" | "unsubscribe_all"
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubscriptionResponse {
    pub status: String,
    pub topic: Option<String>,
    pub message: String,
}

/// One full snapshot as it goes over the wire.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SnapshotMessage {
    pub topic: String,
    pub data: Vec<StockRecord>,
    pub timestamp: String,
}

impl SnapshotMessage {
    pub fn new(topic: &str, data: Vec<StockRecord>) -> Self {
        Self {
            topic: topic.to_string(),
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Topic registry and fan-out point for poll snapshots.
///
/// Delivery is fire-and-forget: a topic without subscribers simply drops the
/// message, and slow subscribers lag rather than applying backpressure.
pub struct Broadcaster {
    // Topic -> broadcast channel for that topic
    topic_channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    // Session ID -> set of topics it is subscribed to
    session_subscriptions: Arc<Mutex<HashMap<String, HashSet<String>>>>,
}

impl Broadcaster {
    pub fn new(channel_capacity: usize) -> Self {
        let mut channels = HashMap::new();
        let (tx, _) = broadcast::channel(channel_capacity);
        channels.insert(STOCKS_TOPIC.to_string(), tx);

        Self {
            topic_channels: Arc::new(Mutex::new(channels)),
            session_subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publish one cycle's records as a single snapshot on [`STOCKS_TOPIC`].
    ///
    /// Returns how many receivers the message reached.
    pub fn broadcast(&self, records: Vec<StockRecord>) -> usize {
        let record_count = records.len();
        let message = SnapshotMessage::new(STOCKS_TOPIC, records);

        match message.to_json() {
            Ok(json) => {
                let subscriber_count = self.broadcast_to_topic(STOCKS_TOPIC, json);
                info!("Broadcasted {} stocks to {} subscribers", record_count, subscriber_count);
                subscriber_count
            }
            Err(e) => {
                error!("Failed to serialize snapshot for {}: {}", STOCKS_TOPIC, e);
                0
            }
        }
    }

    pub fn broadcast_to_topic(&self, topic: &str, data: String) -> usize {
        let channels = match self.topic_channels.lock() {
            Ok(channels) => channels,
            Err(_) => {
                error!("Topic registry lock poisoned, dropping message for {}", topic);
                return 0;
            }
        };

        match channels.get(topic) {
            // send only fails when nobody is listening
            Some(tx) => tx.send(data).unwrap_or_else(|_| {
                debug!("No active receivers for topic: {}", topic);
                0
            }),
            None => 0,
        }
    }

    pub fn subscribe(&self, session_id: &str, topic: &str) -> Result<broadcast::Receiver<String>, SubscriptionError> {
        let channels = self.topic_channels.lock()
            .map_err(|_| SubscriptionError::LockPoisoned)?;
        let mut sessions = self.session_subscriptions.lock()
            .map_err(|_| SubscriptionError::LockPoisoned)?;

        let tx = channels.get(topic)
            .ok_or_else(|| SubscriptionError::UnknownTopic(topic.to_string()))?;

        let topics = sessions.entry(session_id.to_string()).or_default();
        if !topics.insert(topic.to_string()) {
            return Err(SubscriptionError::AlreadySubscribed {
                session_id: session_id.to_string(),
                topic: topic.to_string(),
            });
        }

        info!("Session {} subscribed to topic: {}", session_id, topic);
        Ok(tx.subscribe())
    }

    pub fn unsubscribe(&self, session_id: &str, topic: Option<&str>) -> Result<Vec<String>, SubscriptionError> {
        let mut sessions = self.session_subscriptions.lock()
            .map_err(|_| SubscriptionError::LockPoisoned)?;

        let Some(topic) = topic else {
            // Unsubscribe from everything
            let topics: Vec<String> = sessions.remove(session_id)
                .map(|topics| topics.into_iter().collect())
                .unwrap_or_default();
            if !topics.is_empty() {
                info!("Session {} unsubscribed from all topics: {:?}", session_id, topics);
            }
            return Ok(topics);
        };

        let not_subscribed = || SubscriptionError::NotSubscribed {
            session_id: session_id.to_string(),
            topic: topic.to_string(),
        };

        let topics = sessions.get_mut(session_id).ok_or_else(not_subscribed)?;
        if !topics.remove(topic) {
            return Err(not_subscribed());
        }
        if topics.is_empty() {
            sessions.remove(session_id);
        }

        info!("Session {} unsubscribed from topic: {}", session_id, topic);
        Ok(vec![topic.to_string()])
    }

    pub fn cleanup_session(&self, session_id: &str) {
        let _ = self.unsubscribe(session_id, None);
    }

    pub fn get_subscriber_count(&self, topic: &str) -> usize {
        self.topic_channels.lock()
            .ok()
            .and_then(|channels| channels.get(topic).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    pub fn is_subscribed(&self, session_id: &str, topic: &str) -> bool {
        self.session_subscriptions.lock()
            .ok()
            .and_then(|sessions| sessions.get(session_id).map(|topics| topics.contains(topic)))
            .unwrap_or(false)
    }

    /// (topic count, subscribed session count)
    pub fn get_stats(&self) -> (usize, usize) {
        let topic_count = self.topic_channels.lock()
            .map(|channels| channels.len())
            .unwrap_or(0);

        let session_count = self.session_subscriptions.lock()
            .map(|sessions| sessions.len())
            .unwrap_or(0);

        (topic_count, session_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser::ResponseParser;

    fn records(body: &str) -> Vec<StockRecord> {
        ResponseParser::parse(body).unwrap()
    }

    #[test]
    fn test_broadcast_without_subscribers_is_noop() {
        let broadcaster = Broadcaster::new(4);
        assert_eq!(broadcaster.broadcast(records(r#"{"data":[{"symbol":"SBIN"}]}"#)), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_full_snapshot() {
        let broadcaster = Broadcaster::new(4);
        let mut rx = broadcaster.subscribe("session-1", STOCKS_TOPIC).unwrap();

        let sent = broadcaster.broadcast(records(r#"{"data":[{"symbol":"SBIN"},{"symbol":"TCS"},{"symbol":"SBIN"}]}"#));
        assert_eq!(sent, 1);

        let message: SnapshotMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(message.topic, STOCKS_TOPIC);
        let symbols: Vec<&str> = message.data.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SBIN", "TCS", "SBIN"]);
    }

    #[test]
    fn test_subscribe_rules() {
        let broadcaster = Broadcaster::new(4);

        assert!(matches!(
            broadcaster.subscribe("s1", "/topic/unknown"),
            Err(SubscriptionError::UnknownTopic(_))
        ));

        let _rx = broadcaster.subscribe("s1", STOCKS_TOPIC).unwrap();
        assert!(broadcaster.is_subscribed("s1", STOCKS_TOPIC));
        assert!(matches!(
            broadcaster.subscribe("s1", STOCKS_TOPIC),
            Err(SubscriptionError::AlreadySubscribed { .. })
        ));
        assert_eq!(broadcaster.get_subscriber_count(STOCKS_TOPIC), 1);
        assert_eq!(broadcaster.get_stats(), (1, 1));
    }

    #[test]
    fn test_unsubscribe() {
        let broadcaster = Broadcaster::new(4);
        let _rx = broadcaster.subscribe("s1", STOCKS_TOPIC).unwrap();

        assert!(matches!(
            broadcaster.unsubscribe("s2", Some(STOCKS_TOPIC)),
            Err(SubscriptionError::NotSubscribed { .. })
        ));
        assert_eq!(broadcaster.unsubscribe("s1", Some(STOCKS_TOPIC)).unwrap(), vec![STOCKS_TOPIC]);
        assert!(!broadcaster.is_subscribed("s1", STOCKS_TOPIC));
        assert_eq!(broadcaster.get_stats(), (1, 0));

        let _rx = broadcaster.subscribe("s1", STOCKS_TOPIC).unwrap();
        broadcaster.cleanup_session("s1");
        assert!(broadcaster.unsubscribe("s1", None).unwrap().is_empty());
    }
}
