use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use intake::config::{Config, ResponseMode};
use intake::server::serve;

#[tokio::test]
async fn serves_visits_from_the_socket_peer_and_drains_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let server = tokio::spawn(serve(Config::default_for_test(), listener, async move {
        _ = stopped.await;
    }));

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/api/user"))
        .header("user-agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"message": "Hello"}));

    // Enrichment is detached, poll until the record lands
    let mut listing = None;
    for _ in 0..50 {
        let response = client
            .post(format!("http://{addr}/api/visitors"))
            .send()
            .await
            .unwrap();
        if response.status() == StatusCode::OK {
            listing = Some(response.json::<Value>().await.unwrap());
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let listing = listing.expect("visitor was never stored");
    assert_eq!(listing["visitors"][0]["ip"], json!("127.0.0.1"));
    assert_eq!(listing["visitors"][0]["city"], json!("Unknown"));
    assert_eq!(listing["visitors"][0]["device"]["browser"], json!("Firefox"));

    drop(client);
    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn redirect_mode_without_url_fails_startup() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = Config::default_for_test();
    config.response_mode = ResponseMode::Redirect;

    let result = serve(config, listener, std::future::pending()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn page_mode_without_entry_page_fails_startup() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = Config::default_for_test();
    config.response_mode = ResponseMode::Page;
    config.public_dir = std::env::temp_dir().join("intake-missing-public");

    let result = serve(config, listener, std::future::pending()).await;
    assert!(result.is_err());
}
