use powershades::api::EntityId;
use powershades::config::Config;
use powershades::platform::{
    PollTarget, PositionState, PositionUpdate, ShadesPlatform, group_key, shade_key,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(base: &str, expose: &[&str]) -> Config {
    let mut cfg = Config::default();
    cfg.api.api_token = Some("tok".into());
    cfg.api.base_url = base.to_string();
    cfg.expose_groups = expose.iter().map(|s| s.to_string()).collect();
    cfg
}

async fn mount_shades(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/shades/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Left", "current_position": 20},
            {"id": 2, "name": "Right", "current_position": 30},
            {"id": 3, "name": "Door", "current_position": 100},
            {"id": 4, "name": "Unknown"}
        ])))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_groups(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/groups/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
            {"id": 9, "name": "Living Room", "shades": [1, 2, 3]},
            {"id": 10, "name": "Bedroom", "shades": [4]}
        ]})))
        .mount(server)
        .await;
}

fn recorder() -> (Arc<Mutex<Vec<PositionUpdate>>>, impl Fn(&PositionUpdate) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |update: &PositionUpdate| {
        sink.lock().unwrap().push(update.clone())
    })
}

#[tokio::test]
async fn shade_list_is_served_from_cache_until_forced() {
    let server = MockServer::start().await;
    mount_shades(&server, 2).await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &[])).unwrap();
    assert_eq!(platform.get_shades(false).await.unwrap().len(), 4);
    assert_eq!(platform.get_shades(false).await.unwrap().len(), 4);
    assert_eq!(platform.get_shades(true).await.unwrap().len(), 4);
}

#[tokio::test]
async fn zero_ttl_always_refetches() {
    let server = MockServer::start().await;
    mount_shades(&server, 2).await;

    let mut cfg = config(&server.uri(), &[]);
    cfg.polling.shade_list_cache_ttl = 0;
    let platform = ShadesPlatform::from_config(&cfg).unwrap();
    platform.get_shades(false).await.unwrap();
    platform.get_shades(false).await.unwrap();
}

#[tokio::test]
async fn positions_come_from_the_cache() {
    let server = MockServer::start().await;
    mount_shades(&server, 1).await;
    mount_groups(&server).await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &["Living Room"])).unwrap();
    assert_eq!(platform.shade_position(&EntityId::from(1)).await, None);

    platform.get_shades(false).await.unwrap();
    assert_eq!(platform.shade_position(&EntityId::from(1)).await, Some(20));
    assert_eq!(platform.shade_position(&EntityId::from(4)).await, None);

    let groups = platform.get_groups(false).await.unwrap();
    assert_eq!(platform.group_position(&groups[0]).await, Some(50));
    assert_eq!(platform.group_position(&groups[1]).await, None);
}

#[tokio::test]
async fn poll_pushes_only_to_registered_accessories() {
    let server = MockServer::start().await;
    mount_shades(&server, 1).await;
    mount_groups(&server).await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &["Living Room"])).unwrap();
    let (seen, listener) = recorder();
    let listener = Arc::new(listener);
    platform
        .register_accessory(shade_key(&EntityId::from(1)), listener.clone())
        .await;
    platform
        .register_accessory(shade_key(&EntityId::from(4)), listener.clone())
        .await;
    platform
        .register_accessory(group_key(&EntityId::from(9)), listener.clone())
        .await;
    // Not exposed, so never polled
    platform
        .register_accessory(group_key(&EntityId::from(10)), listener)
        .await;

    platform.poll_once().await.unwrap();

    let updates = seen.lock().unwrap().clone();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].key, "powershades:shade:1");
    assert_eq!(updates[0].current_position, 20);
    assert_eq!(updates[0].target_position, 20);
    assert_eq!(updates[0].state, PositionState::Stopped);
    assert_eq!(updates[1].key, "powershades:group:9");
    assert_eq!(updates[1].name, "Living Room");
    assert_eq!(updates[1].current_position, 50);
}

#[tokio::test]
async fn poll_failure_is_reported_to_the_scheduler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shades/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &[])).unwrap();
    let err = platform.poll_once().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn shade_updates_survive_a_failing_group_endpoint() {
    let server = MockServer::start().await;
    mount_shades(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/groups/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &["Living Room"])).unwrap();
    let (seen, listener) = recorder();
    platform
        .register_accessory(shade_key(&EntityId::from(1)), Arc::new(listener))
        .await;

    let err = platform.poll_once().await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    let updates = seen.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].key, "powershades:shade:1");
    assert_eq!(updates[0].current_position, 20);
}

#[tokio::test]
async fn only_successful_moves_record_activity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/groups/9/move/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/shades/move/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &[])).unwrap();
    assert!(platform.move_group(&EntityId::from(9), 10).await.is_err());
    assert!(platform.activity().last_activity().is_none());

    platform.move_shade("Left", 80).await.unwrap();
    assert!(platform.activity().last_activity().is_some());
    let intervals = platform.intervals();
    let since = platform.activity().since_last_activity();
    assert_eq!(intervals.select(since), intervals.fast);
}

#[tokio::test]
async fn discovery_keeps_going_when_groups_fail() {
    let server = MockServer::start().await;
    mount_shades(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/groups/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let platform = ShadesPlatform::from_config(&config(&server.uri(), &["Living Room"])).unwrap();
    let report = platform.discover().await;
    assert_eq!(report.shades.len(), 4);
    assert!(report.groups.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("500"));
}

#[tokio::test]
async fn discovery_lists_exposed_groups_only() {
    let server = MockServer::start().await;
    mount_shades(&server, 1).await;
    mount_groups(&server).await;

    let platform =
        ShadesPlatform::from_config(&config(&server.uri(), &["Living Room", "Garage"])).unwrap();
    let report = platform.discover().await;
    assert!(report.failures.is_empty());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].name, "Living Room");
}
