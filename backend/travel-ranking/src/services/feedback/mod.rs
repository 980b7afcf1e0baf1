//! Interaction feedback publishing.
//!
//! Fire-and-forget: the ranking core never reads these events back. They
//! land on a Redis stream for offline weight tuning.

use crate::config::Config;
use crate::error::Result;
use crate::services::cold_start::RecommendationStrategy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ranking_cache::{CacheError, SharedRedis};
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Click,
    Book,
    Like,
    Dislike,
}

impl InteractionKind {
    /// Engagement label used when tuning weights offline
    pub fn engagement_score(&self) -> i32 {
        match self {
            InteractionKind::View => 1,
            InteractionKind::Click => 3,
            InteractionKind::Book => 5,
            InteractionKind::Like => 2,
            InteractionKind::Dislike => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Click => "click",
            InteractionKind::Book => "book",
            InteractionKind::Like => "like",
            InteractionKind::Dislike => "dislike",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub entity_id: String,
    pub kind: InteractionKind,
    /// Position the entity was shown at, when known
    pub rank: Option<usize>,
    pub strategy: Option<RecommendationStrategy>,
    pub occurred_at: DateTime<Utc>,
}

impl InteractionEvent {
    pub fn new(user_id: Uuid, entity_id: impl Into<String>, kind: InteractionKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            entity_id: entity_id.into(),
            kind,
            rank: None,
            strategy: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_position(mut self, rank: usize, strategy: RecommendationStrategy) -> Self {
        self.rank = Some(rank);
        self.strategy = Some(strategy);
        self
    }
}

#[async_trait]
pub trait FeedbackPublisher: Send + Sync {
    async fn publish(&self, event: &InteractionEvent) -> Result<()>;
}

/// Appends events to a Redis stream, trimmed to roughly `maxlen` entries
pub struct RedisStreamPublisher {
    redis: SharedRedis,
    stream_key: String,
    maxlen: usize,
}

impl RedisStreamPublisher {
    pub fn new(redis: SharedRedis, stream_key: impl Into<String>, maxlen: usize) -> Self {
        Self {
            redis,
            stream_key: stream_key.into(),
            maxlen,
        }
    }

    pub fn from_config(redis: SharedRedis, config: &Config) -> Self {
        Self::new(
            redis,
            config.feedback_stream_key.clone(),
            config.feedback_stream_maxlen,
        )
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }
}

/// Flat field list of one stream entry; `payload` carries the full event
fn stream_fields(event: &InteractionEvent) -> Result<Vec<(&'static str, String)>> {
    let payload = serde_json::to_string(event).map_err(CacheError::from)?;
    Ok(vec![
        ("user_id", event.user_id.to_string()),
        ("entity_id", event.entity_id.clone()),
        ("kind", event.kind.as_str().to_string()),
        ("engagement", event.kind.engagement_score().to_string()),
        ("payload", payload),
    ])
}

#[async_trait]
impl FeedbackPublisher for RedisStreamPublisher {
    async fn publish(&self, event: &InteractionEvent) -> Result<()> {
        let fields = stream_fields(event)?;

        let mut conn = self.redis.lock().await;
        let entry_id: String = conn
            .xadd_maxlen(
                &self.stream_key,
                StreamMaxlen::Approx(self.maxlen),
                "*", // Auto-generate ID with current timestamp
                &fields,
            )
            .await
            .map_err(CacheError::from)?;

        debug!(
            stream = %self.stream_key,
            entry_id = %entry_id,
            kind = event.kind.as_str(),
            "Feedback event published"
        );
        Ok(())
    }
}

/// Publisher that only logs, for deployments without a stream
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl FeedbackPublisher for LogPublisher {
    async fn publish(&self, event: &InteractionEvent) -> Result<()> {
        info!(
            user_id = %event.user_id,
            entity_id = %event.entity_id,
            kind = event.kind.as_str(),
            engagement = event.kind.engagement_score(),
            rank = ?event.rank,
            "Interaction feedback"
        );
        Ok(())
    }
}

/// Publish on a background task; failures are logged, never surfaced
pub fn publish_detached(
    publisher: Arc<dyn FeedbackPublisher>,
    event: InteractionEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = publisher.publish(&event).await {
            warn!(
                event_id = %event.event_id,
                error = %e,
                "Failed to publish feedback event"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RankingError;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<InteractionEvent>>,
    }

    #[async_trait]
    impl FeedbackPublisher for RecordingPublisher {
        async fn publish(&self, event: &InteractionEvent) -> Result<()> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl FeedbackPublisher for FailingPublisher {
        async fn publish(&self, _event: &InteractionEvent) -> Result<()> {
            Err(RankingError::InvalidInput("stream unavailable".to_string()))
        }
    }

    #[test]
    fn test_engagement_scores() {
        assert_eq!(InteractionKind::View.engagement_score(), 1);
        assert_eq!(InteractionKind::Click.engagement_score(), 3);
        assert_eq!(InteractionKind::Book.engagement_score(), 5);
        assert_eq!(InteractionKind::Like.engagement_score(), 2);
        assert_eq!(InteractionKind::Dislike.engagement_score(), -1);
    }

    #[test]
    fn test_event_serialization() {
        let event = InteractionEvent::new(Uuid::new_v4(), "hotel-1", InteractionKind::Book)
            .with_position(2, RecommendationStrategy::AdaptiveBlend);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "book");
        assert_eq!(json["rank"], 2);
        assert_eq!(json["strategy"], "ADAPTIVE_BLEND");
    }

    #[test]
    fn test_stream_fields() {
        let user_id = Uuid::new_v4();
        let event = InteractionEvent::new(user_id, "hotel-1", InteractionKind::Dislike);
        let fields = stream_fields(&event).unwrap();

        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["user_id", "entity_id", "kind", "engagement", "payload"]);
        assert_eq!(fields[0].1, user_id.to_string());
        assert_eq!(fields[2].1, "dislike");
        assert_eq!(fields[3].1, "-1");

        let payload: InteractionEvent = serde_json::from_str(&fields[4].1).unwrap();
        assert_eq!(payload, event);
    }

    #[tokio::test]
    async fn test_publish_detached_delivers() {
        let recorder = Arc::new(RecordingPublisher::default());
        let event = InteractionEvent::new(Uuid::new_v4(), "hotel-1", InteractionKind::Click);

        publish_detached(recorder.clone(), event.clone()).await.unwrap();

        let events = recorder.events.lock().await;
        assert_eq!(events.as_slice(), &[event]);
    }

    #[tokio::test]
    async fn test_publish_detached_swallows_errors() {
        let event = InteractionEvent::new(Uuid::new_v4(), "hotel-1", InteractionKind::View);
        assert!(publish_detached(Arc::new(FailingPublisher), event).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_publisher() {
        let event = InteractionEvent::new(Uuid::new_v4(), "hotel-1", InteractionKind::Like);
        assert!(LogPublisher.publish(&event).await.is_ok());
    }
}
