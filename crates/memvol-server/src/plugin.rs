//! Docker plugin HTTP endpoint.
//!
//! Docker talks to volume plugins with `POST /<Method>` requests carrying
//! JSON over a Unix socket. Every response, including errors, uses the
//! plugin content type; failures carry `{"Err": "..."}`.

use std::future::Future;
use std::io;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{error, info, warn};

use memvol_kernel::VolumeError;

use crate::constants::PLUGIN_CONTENT_TYPE;
use crate::driver::MemDriver;
use crate::protocol::{CreateRequest, ErrorResponse, MountRequest, NameRequest};

/// A request the plugin could not satisfy.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("malformed request body: {0}")]
    BadRequest(#[from] serde_json::Error),
}

impl PluginError {
    fn status(&self) -> StatusCode {
        match self {
            PluginError::Volume(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PluginError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "plugin request failed");
        reply(
            status,
            &ErrorResponse {
                err: self.to_string(),
            },
        )
    }
}

fn reply<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn ok<T: Serialize>(body: &T) -> Response {
    reply(StatusCode::OK, body)
}

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, PluginError> {
    Ok(serde_json::from_slice(body)?)
}

async fn activate(State(driver): State<MemDriver>) -> Response {
    ok(&driver.activate())
}

async fn create(State(driver): State<MemDriver>, body: Bytes) -> Result<Response, PluginError> {
    let req: CreateRequest = parse(&body)?;
    Ok(ok(&driver.create(req)))
}

async fn remove(State(driver): State<MemDriver>, body: Bytes) -> Result<Response, PluginError> {
    let req: NameRequest = parse(&body)?;
    Ok(ok(&driver.remove(req).await))
}

async fn mount(State(driver): State<MemDriver>, body: Bytes) -> Result<Response, PluginError> {
    let req: MountRequest = parse(&body)?;
    Ok(ok(&driver.mount(req).await?))
}

async fn unmount(State(driver): State<MemDriver>, body: Bytes) -> Result<Response, PluginError> {
    let req: MountRequest = parse(&body)?;
    Ok(ok(&driver.unmount(req).await?))
}

async fn path(State(driver): State<MemDriver>, body: Bytes) -> Result<Response, PluginError> {
    let req: NameRequest = parse(&body)?;
    Ok(ok(&driver.path(req)))
}

async fn get(State(driver): State<MemDriver>, body: Bytes) -> Result<Response, PluginError> {
    let req: NameRequest = parse(&body)?;
    Ok(ok(&driver.get(req).await?))
}

async fn list(State(driver): State<MemDriver>) -> Response {
    ok(&driver.list().await)
}

async fn capabilities(State(driver): State<MemDriver>) -> Response {
    ok(&driver.capabilities())
}

/// Routes for the `Plugin` handshake and the `VolumeDriver` subsystem.
pub fn router(driver: MemDriver) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .with_state(driver)
}

/// Bind `socket`, replacing a stale socket file, and serve until `shutdown`
/// resolves. The socket file is removed on the way out.
pub async fn serve<F>(socket: &Path, driver: MemDriver, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Some(parent) = socket.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::remove_file(socket).await {
        Ok(()) => info!(socket = %socket.display(), "removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = UnixListener::bind(socket)?;
    info!(socket = %socket.display(), "plugin listening");

    let result = axum::serve(listener, router(driver))
        .with_graceful_shutdown(shutdown)
        .await;

    if let Err(e) = tokio::fs::remove_file(socket).await {
        warn!(socket = %socket.display(), error = %e, "failed to remove socket");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_status() {
        let err = PluginError::from(VolumeError::not_found(PathBuf::from("/r/v")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "unable to find volume mounted on /r/v");

        let bad = serde_json::from_slice::<NameRequest>(b"{").unwrap_err();
        let err = PluginError::from(bad);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_headers() {
        let err = PluginError::from(VolumeError::not_found(PathBuf::from("/r/v")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            PLUGIN_CONTENT_TYPE
        );
    }

    #[test]
    fn test_parse_requires_name() {
        assert!(parse::<NameRequest>(&Bytes::from_static(b"{}")).is_err());
        let req: NameRequest = parse(&Bytes::from_static(br#"{"Name":"v"}"#)).unwrap();
        assert_eq!(req.name, "v");
    }
}
