//! HTTP front end: index page, OAuth login/callback and a JSON endpoint

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::aggregator::aggregate;
use crate::auth::{self, TokenProvider};
use crate::classifier::SizeThresholds;
use crate::client::MessageSource;
use crate::error::{GmailError, Result};
use crate::limits::RequestLimits;
use crate::models::ClassificationResult;
use crate::render::{render_index, IndexView};
use crate::session::{SessionContext, SessionData, SessionStore};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub tokens: Arc<dyn TokenProvider>,
    pub messages: Arc<dyn MessageSource>,
    pub thresholds: SizeThresholds,
    pub limits: RequestLimits,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub max_results: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// JSON body of `/api/messages`
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassificationEnvelope {
    pub authenticated: bool,
    pub error: Option<String>,
    pub max_results: u32,
    pub categories: Option<ClassificationResult>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/oauth2callback", get(oauth2callback))
        .route("/api/messages", get(api_messages))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// How often idle sessions are swept from the store
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Serve until Ctrl-C
pub async fn run_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let purge_task = spawn_session_purge(Arc::clone(&state.sessions), SESSION_PURGE_INTERVAL);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down gracefully");
        })
        .await;

    purge_task.abort();
    served?;
    Ok(())
}

/// Periodically drop sessions that have been idle past their TTL
pub fn spawn_session_purge(sessions: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            sessions.purge_expired();
        }
    })
}

/// Token, fetch and aggregation for one request
async fn load_classification(
    state: &AppState,
    session: &mut SessionData,
    limit: u32,
) -> Result<ClassificationResult> {
    let token = auth::valid_token(state.tokens.as_ref(), session).await?;
    let messages = state.messages.list_messages(&token, limit).await?;
    debug!("Classifying {} messages", messages.len());
    Ok(aggregate(messages, &state.thresholds))
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut session = state.sessions.load(&headers);
    let limit = state.limits.clamp(query.max_results.as_deref());

    let outcome = load_classification(&state, &mut session.data, limit).await;
    let page = match &outcome {
        Ok(result) => render_index(&IndexView {
            authenticated: true,
            error: None,
            max_results: Some(limit),
            result: Some(result),
        }),
        Err(GmailError::Unauthenticated) => {
            debug!("Showing login page");
            render_index(&IndexView::default())
        }
        Err(e) => {
            error!("Failed to build size report: {}", e);
            let message = e.to_string();
            render_index(&IndexView {
                error: Some(&message),
                ..Default::default()
            })
        }
    };

    respond_with_session(&state, session, Html(page))
}

async fn api_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut session = state.sessions.load(&headers);
    let limit = state.limits.clamp(query.max_results.as_deref());

    let (status, envelope) = match load_classification(&state, &mut session.data, limit).await {
        Ok(result) => (
            StatusCode::OK,
            ClassificationEnvelope {
                authenticated: true,
                error: None,
                max_results: limit,
                categories: Some(result),
            },
        ),
        Err(e) => {
            let authenticated = !matches!(e, GmailError::Unauthenticated);
            if authenticated {
                error!("Failed to build size report: {}", e);
            }
            (
                e.status_code(),
                ClassificationEnvelope {
                    authenticated,
                    error: authenticated.then(|| e.to_string()),
                    max_results: limit,
                    categories: None,
                },
            )
        }
    };

    respond_with_session(&state, session, (status, Json(envelope)))
}

async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut session = state.sessions.load(&headers);

    match state.tokens.authorization_url() {
        Ok(request) => {
            debug!("Starting OAuth flow");
            session.data.oauth_state = Some(request.state);
            respond_with_session(&state, session, Redirect::to(&request.url))
        }
        Err(e) => {
            error!("Error in login: {}", e);
            let message = format!("Login error: {}", e);
            let page = render_index(&IndexView {
                error: Some(&message),
                ..Default::default()
            });
            respond_with_session(&state, session, Html(page))
        }
    }
}

async fn oauth2callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let mut session = state.sessions.load(&headers);
    debug!("Received OAuth callback");

    match complete_login(state.tokens.as_ref(), &mut session.data, &query).await {
        Ok(()) => {
            info!("Stored credentials in session");
            respond_with_session(&state, session, Redirect::to("/"))
        }
        Err(e) => {
            error!("Error in oauth2callback: {}", e);
            let message = format!("Authentication error: {}", e);
            let page = render_index(&IndexView {
                error: Some(&message),
                ..Default::default()
            });
            respond_with_session(&state, session, Html(page))
        }
    }
}

/// Validate the callback against the session and exchange the code
async fn complete_login<P>(
    provider: &P,
    session: &mut SessionData,
    query: &CallbackQuery,
) -> Result<()>
where
    P: TokenProvider + ?Sized,
{
    // The state is single use, whatever the outcome
    let expected = session
        .oauth_state
        .take()
        .ok_or_else(|| GmailError::InvalidState("No state in session".to_string()))?;

    if let Some(reason) = &query.error {
        return Err(GmailError::AuthError(format!(
            "authorization was not granted: {}",
            reason
        )));
    }

    match query.state.as_deref() {
        Some(returned) if returned == expected => {}
        Some(_) => {
            return Err(GmailError::InvalidState(
                "state does not match this session".to_string(),
            ))
        }
        None => {
            return Err(GmailError::InvalidState(
                "callback is missing the state parameter".to_string(),
            ))
        }
    }

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| GmailError::AuthError("callback is missing the code".to_string()))?;

    let credentials = provider.exchange_code(code).await?;
    session.credentials = Some(credentials);
    Ok(())
}

/// Persist the session and attach its cookie, if one must be set
fn respond_with_session(
    state: &AppState,
    session: SessionContext,
    response: impl IntoResponse,
) -> Response {
    let mut response = response.into_response();
    match state.sessions.save(session) {
        Ok(Some(cookie)) => {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Could not set session cookie: {}", e);
            response = (StatusCode::INTERNAL_SERVER_ERROR, "Session error").into_response();
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthorizationRequest, StoredCredentials};
    use async_trait::async_trait;

    struct StaticProvider;

    #[async_trait]
    impl TokenProvider for StaticProvider {
        fn authorization_url(&self) -> Result<AuthorizationRequest> {
            Ok(AuthorizationRequest {
                url: "https://example.com/auth".to_string(),
                state: "expected".to_string(),
            })
        }

        async fn exchange_code(&self, code: &str) -> Result<StoredCredentials> {
            Ok(StoredCredentials::new(format!("token-for-{}", code), None, None))
        }

        async fn refresh(&self, _credentials: &StoredCredentials) -> Result<StoredCredentials> {
            Err(GmailError::AuthError("unsupported".to_string()))
        }
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackQuery {
        CallbackQuery {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: None,
        }
    }

    fn pending_session() -> SessionData {
        SessionData {
            oauth_state: Some("expected".to_string()),
            credentials: None,
        }
    }

    #[tokio::test]
    async fn test_complete_login_stores_credentials() {
        let mut session = pending_session();
        complete_login(&StaticProvider, &mut session, &callback(Some("abc"), Some("expected")))
            .await
            .unwrap();

        assert!(session.oauth_state.is_none());
        assert_eq!(session.credentials.unwrap().access_token, "token-for-abc");
    }

    #[tokio::test]
    async fn test_complete_login_without_pending_state() {
        let mut session = SessionData::default();
        let err = complete_login(&StaticProvider, &mut session, &callback(Some("abc"), Some("expected")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No state in session"));
    }

    #[tokio::test]
    async fn test_complete_login_state_mismatch() {
        let mut session = pending_session();
        let err = complete_login(&StaticProvider, &mut session, &callback(Some("abc"), Some("forged")))
            .await
            .unwrap_err();
        assert!(matches!(err, GmailError::InvalidState(_)));
        // A failed attempt still consumes the state
        assert!(session.oauth_state.is_none());
        assert!(session.credentials.is_none());
    }

    #[tokio::test]
    async fn test_complete_login_missing_state_or_code() {
        let mut session = pending_session();
        let err = complete_login(&StaticProvider, &mut session, &callback(Some("abc"), None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing the state"));

        let mut session = pending_session();
        let err = complete_login(&StaticProvider, &mut session, &callback(None, Some("expected")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing the code"));
    }

    #[tokio::test]
    async fn test_complete_login_provider_error() {
        let mut session = pending_session();
        let query = CallbackQuery {
            code: None,
            state: Some("expected".to_string()),
            error: Some("access_denied".to_string()),
        };
        let err = complete_login(&StaticProvider, &mut session, &query)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }
}
