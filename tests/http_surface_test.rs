/*!
 * Integration tests for the HTTP surface
 */

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tempfile::{tempdir, TempDir};

use ota_beacon::config::BeaconConfig;
use ota_beacon::server::build_router;

/// Lay out a serve root with a build tree:
///   <root>/index.html
///   <root>/build/project_description.json
///   <root>/build/fw.bin
fn build_tree() -> TempDir {
    let dir = tempdir().unwrap();
    let build = dir.path().join("build");
    std::fs::create_dir_all(&build).unwrap();
    std::fs::write(
        build.join("project_description.json"),
        r#"{"project_version": "2.3.0", "app_bin": "fw.bin"}"#,
    )
    .unwrap();
    std::fs::write(build.join("fw.bin"), b"\xE9firmware-image-bytes").unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>ota</html>").unwrap();
    dir
}

fn test_config(root: &Path) -> BeaconConfig {
    BeaconConfig {
        root: root.to_path_buf(),
        ..BeaconConfig::default()
    }
}

/// Bind an ephemeral port and serve the router from a background task.
async fn spawn_server(config: BeaconConfig) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("read local addr");
    let app = build_router(Arc::new(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve router");
    });
    addr
}

#[tokio::test]
async fn manifest_route_serves_json_with_exact_content_length() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;

    let response = reqwest::get(format!("http://{}/p1/manifest.json", addr))
        .await
        .expect("request manifest");

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let declared_length = response.content_length().expect("content-length header");
    let body = response.bytes().await.expect("read body");
    assert_eq!(declared_length, body.len() as u64);

    let manifest: serde_json::Value = serde_json::from_slice(&body).expect("parse manifest");
    assert_eq!(manifest["manifest_version"], 1);
    assert_eq!(manifest["version"], "2.3.0");
    assert_eq!(manifest["path"], "/build/fw.bin");
    assert_eq!(manifest["port"], 8080);
    assert_eq!(manifest["ignore_version"], true);
    assert_eq!(manifest["type"], 0);
    assert_eq!(manifest["importance"], 1);
}

#[tokio::test]
async fn manifest_responses_are_byte_identical_for_unchanged_metadata() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;
    let url = format!("http://{}/p1/manifest.json", addr);

    let first = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    let second = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn manifest_reflects_metadata_changes_between_requests() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;
    let url = format!("http://{}/p1/manifest.json", addr);

    let before: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(before["version"], "2.3.0");

    std::fs::write(
        root.path().join("build/project_description.json"),
        r#"{"project_version": "2.4.0", "app_bin": "fw-next.bin"}"#,
    )
    .unwrap();

    let after: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(after["version"], "2.4.0");
    assert_eq!(after["path"], "/build/fw-next.bin");
}

#[tokio::test]
async fn static_routes_serve_files_from_the_root() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;

    let response = reqwest::get(format!("http://{}/build/fw.bin", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.bytes().await.unwrap().as_ref(),
        &b"\xE9firmware-image-bytes"[..]
    );

    let response = reqwest::get(format!("http://{}/index.html", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/html")
    );
}

#[tokio::test]
async fn missing_files_return_404() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;

    let response = reqwest::get(format!("http://{}/build/no-such.bin", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Directories are not listable either.
    let response = reqwest::get(format!("http://{}/build", addr)).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn traversal_attempts_never_escape_the_root() {
    let root = build_tree();
    // A file outside the serve root that must never be reachable.
    let outside = tempdir().unwrap();
    let secret = outside.path().join("secret.txt");
    std::fs::write(&secret, "do not serve").unwrap();

    let addr = spawn_server(test_config(root.path())).await;
    let client = reqwest::Client::new();

    // The client's URL parser normalizes bare dot-segments before sending,
    // so only encoded forms exercise the server-side rejection. Either way
    // nothing outside the root may ever be returned.
    for path in [
        "/..%2f..%2fetc%2fpasswd",
        "/build/..%2f..%2fsecret.txt",
        "/%2e%2e/%2e%2e/etc/passwd",
    ] {
        let response = client
            .get(format!("http://{}{}", addr, path))
            .send()
            .await
            .unwrap();
        assert!(
            response.status() == 400 || response.status() == 404,
            "path {} must be rejected, got {}",
            path,
            response.status()
        );
        let body = response.text().await.unwrap();
        assert!(!body.contains("do not serve"));
        assert!(!body.contains("root:"));
    }
}

#[tokio::test]
async fn post_on_manifest_route_is_method_not_allowed() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/p1/manifest.json", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    // Static fallback is GET-only too.
    let response = client
        .post(format!("http://{}/index.html", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn missing_metadata_fails_manifest_but_not_static_routes() {
    let root = build_tree();
    std::fs::remove_file(root.path().join("build/project_description.json")).unwrap();
    let addr = spawn_server(test_config(root.path())).await;

    let response = reqwest::get(format!("http://{}/p1/manifest.json", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    // The connection is answered, not left hanging, and static serving
    // still works.
    let response = reqwest::get(format!("http://{}/build/fw.bin", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn concurrent_manifest_requests_each_get_consistent_responses() {
    let root = build_tree();
    let addr = spawn_server(test_config(root.path())).await;
    let url = format!("http://{}/p1/manifest.json", addr);

    let client = reqwest::Client::new();
    let mut handles = Vec::new();
    for _ in 0..16 {
        let client = client.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let response = client.get(&url).send().await.unwrap();
            let declared = response.content_length().unwrap();
            let body = response.bytes().await.unwrap();
            (declared, body)
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        let (declared, body) = handle.await.unwrap();
        assert_eq!(declared, body.len() as u64);
        bodies.push(body);
    }
    // Unchanged metadata: every response is byte-identical.
    for body in &bodies[1..] {
        assert_eq!(body, &bodies[0]);
    }
}

#[tokio::test]
async fn custom_manifest_route_and_version_override() {
    let root = build_tree();
    let config = BeaconConfig {
        manifest_route: "/ota/latest.json".into(),
        version_override: Some("v0.0.1".into()),
        ..test_config(root.path())
    };
    let addr = spawn_server(config).await;

    let manifest: serde_json::Value =
        reqwest::get(format!("http://{}/ota/latest.json", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(manifest["version"], "v0.0.1");

    // The default route now falls through to static serving and misses.
    let response = reqwest::get(format!("http://{}/p1/manifest.json", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
