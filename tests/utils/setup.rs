use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use hermes::{
    app,
    event::{EventBroker, EventPublisher, PublisherConfig, RoomEvent},
    room::repository::{InMemoryRoomRepository, RoomRepository},
    AppState, RoomService, RoomSettings,
};

use super::mocks::RecordingBroker;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub service: Arc<RoomService>,
    pub router: Router,
    pub recorder: Arc<RecordingBroker>,
}

pub struct TestSetupBuilder {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    broker: Option<Arc<dyn EventBroker>>,
    settings: RoomSettings,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            repository: Arc::new(InMemoryRoomRepository::new()),
            broker: None,
            settings: RoomSettings::default(),
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn RoomRepository + Send + Sync>) -> Self {
        self.repository = repository;
        self
    }

    /// Replace the recording broker; `recorder` then stays empty
    pub fn with_broker(mut self, broker: Arc<dyn EventBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_max_join_attempts(mut self, attempts: u32) -> Self {
        self.settings.max_join_attempts = attempts;
        self
    }

    pub fn build(self) -> TestSetup {
        let recorder = Arc::new(RecordingBroker::default());
        let broker = self
            .broker
            .unwrap_or_else(|| recorder.clone() as Arc<dyn EventBroker>);

        let (publisher, _worker) = EventPublisher::spawn(broker, PublisherConfig::default());
        let service = Arc::new(RoomService::new(self.repository, publisher, self.settings));
        let router = app(AppState::new(service.clone()));

        TestSetup {
            service,
            router,
            recorder,
        }
    }
}

impl TestSetup {
    /// Sends one request through the router, returning status and parsed JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    pub async fn create_room(&self, host_id: &str) -> (StatusCode, serde_json::Value) {
        self.send("POST", "/room", Some(&format!(r#"{{"hostId": "{host_id}"}}"#)))
            .await
    }

    pub async fn join_room(&self, room_id: &str, participant_id: &str) -> StatusCode {
        self.send(
            "POST",
            &format!("/room/{room_id}"),
            Some(&format!(r#"{{"participantId": "{participant_id}"}}"#)),
        )
        .await
        .0
    }

    /// Every event the recorder has seen once the publish queue is drained
    pub async fn published(&self) -> Vec<(String, RoomEvent)> {
        self.service.publisher().flush().await.unwrap();
        self.recorder.events().await
    }
}
