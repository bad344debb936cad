use serde_json::{json, Value};
use tempfile::TempDir;

use feedback_triage::config::Config;
use feedback_triage::{migrate, server};

fn test_config_with_port(tmp: &TempDir, port: u16) -> Config {
    let db_path = tmp.path().join("triage.sqlite");
    let config_content = format!(
        r#"
[db]
path = "{}"

[classifier]
provider = "disabled"

[server]
bind = "127.0.0.1:{}"
"#,
        db_path.display(),
        port
    );
    toml::from_str(&config_content).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Exercise the full HTTP contract: health, the 404 error body before any
/// run, the async run trigger, and the dashboard/report reads afterwards.
#[tokio::test]
async fn test_server_run_trigger_and_reads() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config_with_port(&tmp, port);

    migrate::run_migrations(&cfg).await.unwrap();

    let cfg_clone = cfg.clone();
    let _server_handle = tokio::spawn(async move {
        server::run_server(&cfg_clone).await.ok();
    });

    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    // Health reports status and version
    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());

    // No runs yet → 404 with the error contract
    let resp = client
        .get(format!("{}/reports/latest", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
    assert!(body["error"]["message"].as_str().is_some());

    // Trigger a run → 202 with a run id, pipeline executes asynchronously
    let resp = client
        .post(format!("{}/runs", base))
        .json(&json!({"count": 12}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let body: Value = resp.json().await.unwrap();
    assert!(!body["run_id"].as_str().unwrap().is_empty());

    // Poll until the spawned run has written its report
    let mut report: Option<Value> = None;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let resp = client
            .get(format!("{}/reports/latest", base))
            .send()
            .await
            .unwrap();
        if resp.status() == 200 {
            report = Some(resp.json().await.unwrap());
            break;
        }
    }
    let report = report.expect("triggered run did not produce a report within 5 seconds");
    assert!(report["summary"]
        .as_str()
        .unwrap()
        .contains("12 feedback items processed"));
    assert!(!report["clusters"].as_array().unwrap().is_empty());

    // Dashboard reflects the persisted run
    let resp = client
        .get(format!("{}/dashboard", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["stats"]["total_feedback"], 12);
    assert_eq!(view["sentiment_trend"].as_array().unwrap().len(), 7);
    assert_eq!(view["volume_trend"].as_array().unwrap().len(), 7);
    assert!(view["recent_activity"].as_array().unwrap().len() <= 15);
}

/// A bodyless trigger falls back to the configured generator count.
#[tokio::test]
async fn test_server_run_trigger_without_body() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config_with_port(&tmp, port);

    migrate::run_migrations(&cfg).await.unwrap();

    let cfg_clone = cfg.clone();
    let _server_handle = tokio::spawn(async move {
        server::run_server(&cfg_clone).await.ok();
    });

    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let resp = client.post(format!("{}/runs", base)).send().await.unwrap();
    assert_eq!(resp.status(), 202);

    // Default [generator].count is 25
    let mut report: Option<Value> = None;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let resp = client
            .get(format!("{}/reports/latest", base))
            .send()
            .await
            .unwrap();
        if resp.status() == 200 {
            report = Some(resp.json().await.unwrap());
            break;
        }
    }
    let report = report.expect("triggered run did not produce a report within 5 seconds");
    assert!(report["summary"]
        .as_str()
        .unwrap()
        .contains("25 feedback items processed"));
}
