//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use gmail_size_sorter::auth::{AccessToken, AuthorizationRequest, StoredCredentials, TokenProvider};
use gmail_size_sorter::client::MessageSource;
use gmail_size_sorter::error::Result;
use gmail_size_sorter::models::MessageSummary;
use gmail_size_sorter::session::SessionStore;
use gmail_size_sorter::web::AppState;
use gmail_size_sorter::{RequestLimits, SizeThresholds};
use mockall::mock;

pub const COOKIE_NAME: &str = "test_session";
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth?state=state-123";
pub const AUTH_STATE: &str = "state-123";

/// Create a test message with a given size
pub fn create_test_message(id: &str, size: u64, subject: &str) -> MessageSummary {
    MessageSummary {
        id: id.to_string(),
        size_estimate: size,
        subject: subject.to_string(),
        thread_id: format!("thread_{}", id),
    }
}

/// The four-message mailbox used across the report tests
pub fn sample_mailbox() -> Vec<MessageSummary> {
    vec![
        create_test_message("a", 50_000, "Lunch?"),
        create_test_message("b", 200_000, "Slides"),
        create_test_message("c", 2_000_000, "Holiday photos"),
        create_test_message("d", 90_000, "Invoice"),
    ]
}

pub fn fresh_credentials(token: &str) -> StoredCredentials {
    StoredCredentials::new(
        token,
        Some("refresh-token".to_string()),
        Some(chrono::Utc::now() + chrono::Duration::hours(1)),
    )
}

mock! {
    pub MessageSource {}

    #[async_trait::async_trait]
    impl MessageSource for MessageSource {
        async fn list_messages(&self, token: &AccessToken, limit: u32) -> Result<Vec<MessageSummary>>;
    }
}

mock! {
    pub TokenProvider {}

    #[async_trait::async_trait]
    impl TokenProvider for TokenProvider {
        fn authorization_url(&self) -> Result<AuthorizationRequest>;
        async fn exchange_code(&self, code: &str) -> Result<StoredCredentials>;
        async fn refresh(&self, credentials: &StoredCredentials) -> Result<StoredCredentials>;
    }
}

/// Token provider that always starts the same authorization flow
pub fn provider_with_fixed_state() -> MockTokenProvider {
    let mut provider = MockTokenProvider::new();
    provider.expect_authorization_url().returning(|| {
        Ok(AuthorizationRequest {
            url: AUTH_URL.to_string(),
            state: AUTH_STATE.to_string(),
        })
    });
    provider
}

pub fn app_state(tokens: MockTokenProvider, messages: MockMessageSource) -> AppState {
    app_state_with_sessions(tokens, messages, Arc::new(SessionStore::new(COOKIE_NAME, false)))
}

pub fn app_state_with_sessions(
    tokens: MockTokenProvider,
    messages: MockMessageSource,
    sessions: Arc<SessionStore>,
) -> AppState {
    AppState {
        sessions,
        tokens: Arc::new(tokens),
        messages: Arc::new(messages),
        thresholds: SizeThresholds::default(),
        limits: RequestLimits::default(),
    }
}
