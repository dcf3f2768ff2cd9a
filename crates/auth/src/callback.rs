//! Loopback HTTP listener that captures a single OAuth redirect.

use crate::error::AuthError;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Bytes, header::HeaderValue, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};

/// Default port the registered redirect URI points at.
pub const DEFAULT_PORT: u16 = 8080;
/// How long to wait for the browser redirect before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Query parameters delivered by the provider redirect.
#[derive(Debug, Clone)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><body>\
<h1>Authentication successful</h1>\
<p>You can close this tab and return to the terminal.</p>\
</body></html>";

const FAILURE_PAGE: &str = "<!DOCTYPE html><html><body>\
<h1>Authentication failed</h1>\
<p>You can close this tab; see the terminal for details.</p>\
</body></html>";

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Bind the loopback listener.
///
/// Done before the browser is opened so a busy port fails fast, and bound to
/// `127.0.0.1` only so nothing off-host can reach the redirect endpoint.
pub async fn bind(port: u16) -> Result<TcpListener, AuthError> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    TcpListener::bind(addr)
        .await
        .map_err(|e| AuthError::Network(format!("failed to bind 127.0.0.1:{port}: {e}")))
}

/// Serve `listener` until one `GET /callback` arrives or `wait` elapses.
///
/// Exactly one set of parameters is ever delivered: the first callback takes
/// the one-shot sender, and a racing duplicate still gets a page but its
/// parameters are dropped. The accept task and the bound socket are torn down
/// on every exit path, so the port is released even on timeout or
/// cancellation.
pub async fn await_callback(
    listener: TcpListener,
    wait: Duration,
) -> Result<CallbackParams, AuthError> {
    let (tx, rx) = oneshot::channel::<CallbackParams>();
    let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));

    let accept_task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let io = TokioIo::new(stream);
            let tx = Arc::clone(&tx);
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx = Arc::clone(&tx);
                async move { Ok::<_, hyper::Error>(handle(&req, &tx)) }
            });
            // One connection at a time is all the flow needs; the waiter
            // below completes as soon as the one-shot fires.
            let _ = http1::Builder::new().serve_connection(io, service).await;
        }
    });

    let result = match timeout(wait, rx).await {
        Ok(Ok(params)) => Ok(params),
        Ok(Err(_)) => Err(AuthError::Network("callback listener closed unexpectedly".into())),
        Err(_) => Err(AuthError::CallbackTimeout(wait)),
    };
    accept_task.abort();
    result
}

fn handle(req: &Request<hyper::body::Incoming>, tx: &CallbackSender) -> Response<Full<Bytes>> {
    if req.method() != Method::GET || req.uri().path() != "/callback" {
        let mut response = Response::new(Full::new(Bytes::from("not found")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    }

    let params = parse_params(req.uri().query().unwrap_or(""));
    let page = if params.error.is_some() {
        FAILURE_PAGE
    } else {
        SUCCESS_PAGE
    };

    // Only the first callback wins; later requests find the sender gone.
    if let Some(sender) = tx.lock().ok().and_then(|mut guard| guard.take()) {
        let _ = sender.send(params);
    }

    // Status 200 either way; the page, not the status, tells the human what
    // happened.
    let mut response = Response::new(Full::new(Bytes::from(page)));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn parse_params(query: &str) -> CallbackParams {
    let mut params = CallbackParams {
        code: None,
        state: None,
        error: None,
        error_description: None,
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind_ephemeral() -> (TcpListener, u16) {
        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn delivers_code_and_state_once() {
        let (listener, port) = bind_ephemeral().await;
        let waiter = tokio::spawn(await_callback(listener, Duration::from_secs(5)));

        let body = reqwest::get(format!(
            "http://127.0.0.1:{port}/callback?code=authz&state=st-1"
        ))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
        assert!(body.contains("successful"));

        let params = waiter.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("authz"));
        assert_eq!(params.state.as_deref(), Some("st-1"));
    }

    #[tokio::test]
    async fn provider_error_is_captured_with_failure_page() {
        let (listener, port) = bind_ephemeral().await;
        let waiter = tokio::spawn(await_callback(listener, Duration::from_secs(5)));

        let body = reqwest::get(format!(
            "http://127.0.0.1:{port}/callback?error=access_denied&error_description=user%20declined"
        ))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
        assert!(body.contains("failed"));

        let params = waiter.await.unwrap().unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("user declined"));
    }

    #[tokio::test]
    async fn times_out_and_releases_the_port() {
        let (listener, port) = bind_ephemeral().await;
        let result = await_callback(listener, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(AuthError::CallbackTimeout(_))));

        // The socket is gone; the port can be bound again.
        let rebound = bind(port).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn non_callback_paths_get_404() {
        let (listener, port) = bind_ephemeral().await;
        let waiter = tokio::spawn(await_callback(listener, Duration::from_secs(5)));

        let status = reqwest::get(format!("http://127.0.0.1:{port}/favicon.ico"))
            .await
            .unwrap()
            .status();
        assert_eq!(status.as_u16(), 404);

        // The flow is still waiting for the real callback.
        reqwest::get(format!("http://127.0.0.1:{port}/callback?code=c&state=s"))
            .await
            .unwrap();
        let params = waiter.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("c"));
    }
}
