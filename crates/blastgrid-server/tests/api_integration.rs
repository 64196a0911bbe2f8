#[allow(dead_code)]
mod common;

use blastgrid_server::config::ServerConfig;
use common::{TestServer, ws_connect, ws_create_room, ws_player};

#[tokio::test]
async fn health_reports_counts() {
    let server = TestServer::new().await;
    let _anon = ws_connect(&server.ws_url()).await;
    let mut alice = ws_player(&server, "alice").await;
    ws_create_room(&mut alice, "Arena", 4).await;

    let resp = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"]["websocket"], 2);
    assert_eq!(body["connections"]["registered"], 1);
    assert_eq!(body["rooms"]["active"], 1);
    assert_eq!(body["rooms"]["playing"], 0);
    assert_eq!(body["rooms"]["players"], 1);
}

#[tokio::test]
async fn rooms_endpoint_lists_lobby() {
    let server = TestServer::new().await;
    let mut alice = ws_player(&server, "alice").await;
    let room = ws_create_room(&mut alice, "Arena", 3).await;

    let body: serde_json::Value = reqwest::get(format!("{}/api/v1/rooms", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rooms = body.as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], room.id.as_str());
    assert_eq!(rooms[0]["name"], "Arena");
    assert_eq!(rooms[0]["max_players"], 3);
    assert_eq!(rooms[0]["started"], false);
}

#[tokio::test]
async fn leaderboard_starts_empty() {
    let server = TestServer::new().await;
    let body: serde_json::Value =
        reqwest::get(format!("{}/api/v1/leaderboard", server.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn unknown_player_is_404() {
    let server = TestServer::new().await;
    let resp = reqwest::get(format!(
        "{}/api/v1/players/ghost/stats",
        server.base_url()
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn connection_cap_rejects_upgrade() {
    let config = ServerConfig {
        limits: blastgrid_server::config::LimitsConfig {
            max_ws_connections: 1,
            ..Default::default()
        },
        ..ServerConfig::default()
    };
    let server = TestServer::from_config(config).await;
    let _first = ws_player(&server, "alice").await;

    let second = tokio_tungstenite::connect_async(server.ws_url()).await;
    assert!(second.is_err());
}
