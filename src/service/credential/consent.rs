//! Browser-based consent with a loopback redirect listener.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use tokio::{
    net::TcpListener,
    sync::{Mutex, oneshot},
};
use tracing::{info, instrument, warn};

use crate::base::error::{AssistantError, CapabilityRes};

/// The authorization code together with the redirect it was delivered to.
#[derive(Debug)]
pub(crate) struct ConsentGrant {
    pub code: String,
    pub redirect_uri: String,
}

/// Query parameters Google appends to the redirect.
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// How the consent page is presented and how long the redirect may take.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConsentOptions {
    pub timeout: Duration,
    pub open_browser: bool,
}

/// Open the consent page and wait for the redirect.
///
/// Gives up with an authorization error once `options.timeout` passes without
/// a redirect.
#[instrument(skip_all)]
pub(crate) async fn obtain_consent(auth_uri: &str, client_id: &str, scopes: &[&str], options: ConsentOptions) -> CapabilityRes<ConsentGrant> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
    let state = uuid::Uuid::new_v4().to_string();

    let url = consent_url(auth_uri, client_id, &redirect_uri, scopes, &state)?;

    info!("Please visit this URL to authorize this application: {}", url);
    if options.open_browser
        && let Err(e) = webbrowser::open(url.as_str())
    {
        warn!("Could not open a browser ({}); open the URL manually.", e);
    }

    // Serve the redirect until the first callback arrives.

    let (tx, rx) = oneshot::channel();
    let sender: CallbackSender = Arc::new(Mutex::new(Some(tx)));
    let app = Router::new().route("/", get(handle_callback)).with_state(sender);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        });

        if let Err(e) = server.await {
            warn!("Consent listener failed: {}", e);
        }
    });

    let waited = tokio::time::timeout(options.timeout, rx).await;
    let _ = stop_tx.send(());

    let params = match waited {
        Ok(Ok(params)) => params,
        Ok(Err(_)) => return Err(AssistantError::Authorization("consent listener closed before a redirect arrived".to_string())),
        Err(_) => {
            return Err(AssistantError::Authorization(format!(
                "consent was not completed within {} seconds",
                options.timeout.as_secs()
            )));
        }
    };

    let code = check_callback(params, &state)?;

    Ok(ConsentGrant { code, redirect_uri })
}

/// Build the consent page URL.
pub(crate) fn consent_url(auth_uri: &str, client_id: &str, redirect_uri: &str, scopes: &[&str], state: &str) -> CapabilityRes<reqwest::Url> {
    let scope = scopes.join(" ");

    reqwest::Url::parse_with_params(
        auth_uri,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| AssistantError::Configuration(format!("invalid authorization URL `{auth_uri}`: {e}")))
}

/// Validate the redirect and pull out the code.
fn check_callback(params: CallbackParams, expected_state: &str) -> CapabilityRes<String> {
    if let Some(error) = params.error {
        return Err(AssistantError::Authorization(format!("consent was not granted: {error}")));
    }

    if params.state.as_deref() != Some(expected_state) {
        return Err(AssistantError::Authorization("consent redirect carried an unexpected state".to_string()));
    }

    params
        .code
        .ok_or_else(|| AssistantError::Authorization("consent redirect carried no authorization code".to_string()))
}

async fn handle_callback(State(sender): State<CallbackSender>, Query(params): Query<CallbackParams>) -> &'static str {
    if let Some(tx) = sender.lock().await.take() {
        let _ = tx.send(params);
    }

    "The authentication flow has completed. You may close this window."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_url_carries_offline_access() {
        let url = consent_url(
            "https://accounts.google.com/o/oauth2/v2/auth",
            "client-id",
            "http://127.0.0.1:5555/",
            &["https://www.googleapis.com/auth/calendar"],
            "xyz",
        )
        .unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["client_id"], "client-id");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:5555/");
        assert_eq!(pairs["scope"], "https://www.googleapis.com/auth/calendar");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["state"], "xyz");
    }

    #[test]
    fn test_callback_state_must_match() {
        let params = CallbackParams {
            code: Some("4/abc".to_string()),
            state: Some("other".to_string()),
            error: None,
        };

        assert!(check_callback(params, "xyz").is_err());
    }

    #[test]
    fn test_callback_denied() {
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            ..Default::default()
        };

        let err = check_callback(params, "xyz").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_callback_yields_code() {
        let params = CallbackParams {
            code: Some("4/abc".to_string()),
            state: Some("xyz".to_string()),
            error: None,
        };

        assert_eq!(check_callback(params, "xyz").unwrap(), "4/abc");
    }
}
