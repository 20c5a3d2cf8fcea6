//! Integration test: drive the plugin over a real Unix socket.
//!
//! Requests are written as raw HTTP/1.1, the way the Docker daemon sends
//! them, and sessions are recorded instead of mounted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use memvol_kernel::MountRegistry;
use memvol_kernel::testing::RecordingFactory;
use memvol_server::MemDriver;
use memvol_server::constants::PLUGIN_CONTENT_TYPE;

struct Plugin {
    _dir: tempfile::TempDir,
    root: PathBuf,
    socket: PathBuf,
    factory: RecordingFactory,
    stop: Option<oneshot::Sender<()>>,
    server: JoinHandle<std::io::Result<()>>,
}

impl Plugin {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("volumes");
        // parent directory is created by serve()
        let socket = dir.path().join("run").join("mem.sock");
        let factory = RecordingFactory::new();
        let registry = Arc::new(MountRegistry::new(&root, Arc::new(factory.clone())));

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn({
            let socket = socket.clone();
            async move {
                memvol_server::serve(&socket, MemDriver::new(registry), async {
                    let _ = stopped.await;
                })
                .await
            }
        });

        wait_for_socket(&socket).await;
        Self {
            _dir: dir,
            root,
            socket,
            factory,
            stop: Some(stop),
            server,
        }
    }

    async fn call(&self, method: &str, body: &str) -> (u16, String, Value) {
        let mut stream = UnixStream::connect(&self.socket).await.unwrap();
        let request = format!(
            "POST /{method} HTTP/1.1\r\n\
             Host: plugin\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();
        let (head, payload) = raw.split_once("\r\n\r\n").unwrap();

        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap();
        let content_type = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-type")
                    .then(|| value.trim().to_string())
            })
            .unwrap_or_default();
        let json = if payload.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(payload).unwrap()
        };
        (status, content_type, json)
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.server).await.unwrap().unwrap();
        assert!(!self.socket.exists(), "socket file should be removed");
    }
}

async fn wait_for_socket(socket: &Path) {
    for _ in 0..200 {
        if UnixStream::connect(socket).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("plugin never started listening on {}", socket.display());
}

#[tokio::test]
async fn test_activate_and_capabilities() {
    let plugin = Plugin::start().await;

    let (status, content_type, body) = plugin.call("Plugin.Activate", "").await;
    assert_eq!(status, 200);
    assert_eq!(content_type, PLUGIN_CONTENT_TYPE);
    assert_eq!(body, json!({"Implements": ["VolumeDriver"]}));

    let (status, _, body) = plugin.call("VolumeDriver.Capabilities", "{}").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"Capabilities": {"Scope": "local"}}));

    plugin.shutdown().await;
}

#[tokio::test]
async fn test_volume_lifecycle_over_socket() {
    let plugin = Plugin::start().await;
    let mountpoint = plugin.root.join("scratch").display().to_string();

    let (status, _, body) = plugin
        .call("VolumeDriver.Create", r#"{"Name":"scratch","Opts":{}}"#)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({}));

    let (_, _, body) = plugin.call("VolumeDriver.Path", r#"{"Name":"scratch"}"#).await;
    assert_eq!(body, json!({"Mountpoint": mountpoint}));

    // two containers share the volume
    for id in ["c1", "c2"] {
        let (status, _, body) = plugin
            .call(
                "VolumeDriver.Mount",
                &json!({"Name": "scratch", "ID": id}).to_string(),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"Mountpoint": mountpoint}));
    }
    assert_eq!(plugin.factory.starts(), 1);
    assert!(Path::new(&mountpoint).is_dir());

    let (_, _, body) = plugin.call("VolumeDriver.Get", r#"{"Name":"scratch"}"#).await;
    assert_eq!(
        body,
        json!({"Volume": {"Name": "scratch", "Mountpoint": mountpoint}})
    );

    let (_, _, body) = plugin.call("VolumeDriver.List", "").await;
    assert_eq!(
        body,
        json!({"Volumes": [{"Name": "scratch", "Mountpoint": mountpoint}]})
    );

    let unmount = r#"{"Name":"scratch","ID":"c1"}"#;
    let (status, _, _) = plugin.call("VolumeDriver.Unmount", unmount).await;
    assert_eq!(status, 200);
    assert_eq!(plugin.factory.stops(), 0);

    let (status, _, _) = plugin.call("VolumeDriver.Unmount", unmount).await;
    assert_eq!(status, 200);
    assert_eq!(plugin.factory.stops(), 1);

    let (status, content_type, body) =
        plugin.call("VolumeDriver.Get", r#"{"Name":"scratch"}"#).await;
    assert_eq!(status, 500);
    assert_eq!(content_type, PLUGIN_CONTENT_TYPE);
    assert_eq!(
        body,
        json!({"Err": format!("unable to find volume mounted on {mountpoint}")})
    );

    let (status, _, body) = plugin.call("VolumeDriver.Remove", r#"{"Name":"scratch"}"#).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({}));

    plugin.shutdown().await;
}

#[tokio::test]
async fn test_unmount_without_mount_fails() {
    let plugin = Plugin::start().await;

    let (status, _, body) = plugin
        .call("VolumeDriver.Unmount", r#"{"Name":"ghost","ID":"c1"}"#)
        .await;
    assert_eq!(status, 500);
    let expected = format!(
        "unable to find volume mounted on {}",
        plugin.root.join("ghost").display()
    );
    assert_eq!(body, json!({"Err": expected}));

    plugin.shutdown().await;
}

#[tokio::test]
async fn test_mount_failure_reports_error() {
    let plugin = Plugin::start().await;
    plugin.factory.fail_starts(true);

    let (status, _, body) = plugin
        .call("VolumeDriver.Mount", r#"{"Name":"v","ID":"c1"}"#)
        .await;
    assert_eq!(status, 500);
    let message = body["Err"].as_str().unwrap();
    assert!(message.contains("failed to mount filesystem"), "{message}");

    let (_, _, body) = plugin.call("VolumeDriver.List", "{}").await;
    assert_eq!(body, json!({"Volumes": []}));

    plugin.shutdown().await;
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let plugin = Plugin::start().await;

    let (status, content_type, body) = plugin.call("VolumeDriver.Mount", "{not json").await;
    assert_eq!(status, 400);
    assert_eq!(content_type, PLUGIN_CONTENT_TYPE);
    assert!(body["Err"].as_str().unwrap().starts_with("malformed request body"));
    assert_eq!(plugin.factory.starts(), 0);

    plugin.shutdown().await;
}

#[tokio::test]
async fn test_stale_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mem.sock");
    std::fs::write(&socket, b"stale").unwrap();

    let registry = Arc::new(MountRegistry::new(
        dir.path().join("volumes"),
        Arc::new(RecordingFactory::new()),
    ));
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn({
        let socket = socket.clone();
        async move {
            memvol_server::serve(&socket, MemDriver::new(registry), async {
                let _ = stopped.await;
            })
            .await
        }
    });

    wait_for_socket(&socket).await;
    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
    assert!(!socket.exists());
}
