//! Backend connectivity as seen by the client.

use super::{Effect, Notice, NoticeLevel, Transition};
use crate::services::ServiceFactory;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub connection_error: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    CheckStarted,
    /// The health endpoint answered; `connected` is its success flag.
    CheckCompleted { connected: bool },
    CheckFailed { error: String },
}

pub fn apply(
    state: ConnectionState,
    action: ConnectionAction,
    now: DateTime<Utc>,
) -> Transition<ConnectionState> {
    match action {
        ConnectionAction::CheckStarted => Transition::new(ConnectionState {
            is_connecting: true,
            connection_error: None,
            ..state
        }),
        ConnectionAction::CheckCompleted { connected } => {
            let mut transition = Transition::new(ConnectionState {
                is_connected: connected,
                is_connecting: false,
                last_check: Some(now),
                ..state
            });
            if connected {
                transition.push(Effect::Notify(Notice::new(
                    NoticeLevel::Success,
                    "Connected",
                    "Successfully connected to AI backend",
                )));
            }
            transition
        }
        ConnectionAction::CheckFailed { error } => Transition::with_effects(
            ConnectionState {
                is_connected: false,
                is_connecting: false,
                connection_error: Some(error.clone()),
                last_check: Some(now),
            },
            vec![Effect::Notify(Notice::new(
                NoticeLevel::Error,
                "Connection Failed",
                error,
            ))],
        ),
    }
}

/// Probes `GET /health` and folds the outcome into `state`.
pub async fn check_connection(
    state: ConnectionState,
    factory: &ServiceFactory,
) -> Transition<ConnectionState> {
    let started = apply(state, ConnectionAction::CheckStarted, Utc::now());
    let outcome = match factory.api_client().health().await {
        Ok(response) => ConnectionAction::CheckCompleted {
            connected: response.success,
        },
        Err(err) => ConnectionAction::CheckFailed { error: err.message },
    };
    started.and_then(|state| apply(state, outcome, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{MockResponse, MockServer};
    use serde_json::json;

    #[test]
    fn failed_check_records_error_and_notifies() {
        let now = Utc::now();
        let started = apply(ConnectionState::default(), ConnectionAction::CheckStarted, now);
        assert!(started.state.is_connecting);

        let failed = apply(
            started.state,
            ConnectionAction::CheckFailed {
                error: "refused".to_string(),
            },
            now,
        );
        assert!(!failed.state.is_connected);
        assert!(!failed.state.is_connecting);
        assert_eq!(failed.state.connection_error.as_deref(), Some("refused"));
        assert_eq!(failed.state.last_check, Some(now));
        assert!(matches!(
            &failed.effects[..],
            [Effect::Notify(notice)] if notice.level == NoticeLevel::Error
        ));
    }

    #[tokio::test]
    async fn check_against_live_backend() {
        let server = MockServer::one(MockResponse::json(200, json!({"status": "healthy"}))).await;
        let factory = ServiceFactory::new(server.config()).unwrap();

        let transition = check_connection(ConnectionState::default(), &factory).await;
        assert!(transition.state.is_connected);
        assert!(transition.state.last_check.is_some());
        assert_eq!(transition.effects.len(), 1);
    }

    #[tokio::test]
    async fn check_against_failing_backend() {
        let server = MockServer::one(MockResponse::json(503, json!({"message": "maintenance"}))).await;
        let factory = ServiceFactory::new(server.config()).unwrap();

        let transition = check_connection(ConnectionState::default(), &factory).await;
        assert!(!transition.state.is_connected);
        assert_eq!(
            transition.state.connection_error.as_deref(),
            Some("maintenance")
        );
    }
}
