use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use filestore::{FileStorage, Storage};
use reqwest::StatusCode;
use serde_json::{json, Value};
use survey::Dataset;
use survey_client::{HttpSurveyApi, SessionOptions, SurveySession};
use survey_server::{build_router, AppConfig, AppState, IdentitySource};
use tempfile::TempDir;

struct TestServer {
    base: String,
    _dir: TempDir,
    data_dir: std::path::PathBuf,
}

fn sample_items(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "turn_prompt_hash": format!("h{i}"),
                "model_name": "m",
                "conversations": [
                    {"from": "human", "value": format!("question {i}")},
                    {"from": "gpt", "value": format!("answer {i}")}
                ]
            })
        })
        .collect()
}

async fn spawn(items: Vec<Value>, cfg: AppConfig) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().join("data");
    let (dataset, _) = Dataset::from_items("Org/Set", items);
    let store: Arc<dyn Storage> = Arc::new(FileStorage::new(&data_dir, &dataset.name));
    let cfg = AppConfig { data_dir: data_dir.clone(), ..cfg };
    let app = build_router(Arc::new(AppState::new(dataset, store, cfg)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    });

    TestServer { base: format!("http://{addr}/api"), _dir: dir, data_dir }
}

async fn spawn_default(n: usize) -> TestServer {
    spawn(sample_items(n), AppConfig::default()).await
}

async fn get_json(url: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(url).await.expect("request");
    let status = resp.status();
    (status, resp.json().await.expect("json"))
}

async fn post_json(url: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.expect("request");
    let status = resp.status();
    (status, resp.json().await.expect("json"))
}

#[tokio::test]
async fn health_and_dataset_info() {
    let srv = spawn_default(3).await;

    let (status, root) = get_json(&srv.base).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["message"], "Survey API is running");
    assert_eq!(root["formatSupport"]["parquet"], false);

    let (status, info) = get_json(&format!("{}/dataset/info", srv.base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info, json!({"name": "Org/Set", "totalSamples": 3, "formatSupport": {"json": true, "parquet": false}}));
}

#[tokio::test]
async fn samples_follow_a_stable_permutation() {
    let srv = spawn_default(3).await;

    let mut seen = Vec::new();
    for pos in 0..3 {
        let (status, s) = get_json(&format!("{}/samples/{pos}", srv.base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(s["total_available"], 3);
        assert_eq!(s["is_last_sample"].as_bool().unwrap_or(false), pos == 2);
        assert_eq!(s["conversations"][0]["from"], "human");
        seen.push(s["turn_prompt_hash"].as_str().unwrap().to_string());
    }
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["h0", "h1", "h2"]);

    let (_, again) = get_json(&format!("{}/samples/1", srv.base)).await;
    assert_eq!(again["turn_prompt_hash"], seen[1].as_str());

    let (_, past_end) = get_json(&format!("{}/samples/99", srv.base)).await;
    assert_eq!(past_end["turn_prompt_hash"], seen[2].as_str());
    assert_eq!(past_end["is_last_sample"], true);

    for junk in ["abc", "-4"] {
        let (status, s) = get_json(&format!("{}/samples/{junk}", srv.base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(s["turn_prompt_hash"], seen[0].as_str());
    }

    let user = survey::identity("127.0.0.1");
    let stored = srv.data_dir.join(format!("user_indices/Org_Set/{user}.json"));
    assert!(stored.is_file());
}

#[tokio::test]
async fn session_limit_caps_the_permutation() {
    let cfg = AppConfig { session_limit: 2, ..AppConfig::default() };
    let srv = spawn(sample_items(5), cfg).await;
    let (_, s) = get_json(&format!("{}/samples/0", srv.base)).await;
    assert_eq!(s["total_available"], 2);
    let (_, s) = get_json(&format!("{}/samples/1", srv.base)).await;
    assert_eq!(s["is_last_sample"], true);
}

#[tokio::test]
async fn empty_dataset_is_unavailable() {
    let srv = spawn(vec![], AppConfig::default()).await;
    let (status, body) = get_json(&format!("{}/samples/0", srv.base)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn ratings_are_upserted_per_sample() {
    let srv = spawn_default(3).await;
    let url = format!("{}/ratings", srv.base);

    let (_, list) = get_json(&url).await;
    assert_eq!(list, json!([]));
    let (_, progress) = get_json(&format!("{url}/progress")).await;
    assert_eq!(progress, json!({"completed": 0, "timestamp": null}));

    let (status, body) = post_json(&url, json!({"turn_prompt_hash": "h1", "label": true})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"success": true}));
    post_json(&url, json!({"turn_prompt_hash": "h2", "label": true})).await;
    post_json(&url, json!({"turn_prompt_hash": "h1", "label": false})).await;

    let (_, list) = get_json(&url).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["turn_prompt_hash"], "h1");
    assert_eq!(list[0]["label"], false);
    assert_eq!(list[1]["turn_prompt_hash"], "h2");

    let (_, progress) = get_json(&format!("{url}/progress")).await;
    assert_eq!(progress["completed"], 2);
    assert_eq!(progress["timestamp"], list[1]["timestamp"]);
}

#[tokio::test]
async fn invalid_ratings_are_rejected() {
    let srv = spawn_default(1).await;
    let url = format!("{}/ratings", srv.base);

    for body in [
        json!({"label": true}),
        json!({"turn_prompt_hash": "h0"}),
        json!({"turn_prompt_hash": "", "label": true}),
        json!({"turn_prompt_hash": "h0", "label": "yes"}),
    ] {
        let (status, resp) = post_json(&url, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp["error"].is_string());
    }

    let (_, list) = get_json(&url).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn bulk_import_counts_applied_ratings() {
    let srv = spawn_default(3).await;
    let url = format!("{}/ratings/bulk", srv.base);

    let (status, body) = post_json(&url, json!({"turn_prompt_hash": "h0", "label": true})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Expected an array of ratings");

    let (status, body) = post_json(
        &url,
        json!([
            {"turn_prompt_hash": "h0", "label": true, "timestamp": "2024-01-02T03:04:05Z"},
            {"turn_prompt_hash": "h1"},
            {"content_hash": "h2", "label": false},
            42
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"success": true, "count": 2}));

    let (_, list) = get_json(&format!("{}/ratings", srv.base)).await;
    assert_eq!(list[0]["timestamp"], "2024-01-02T03:04:05Z");
    assert_eq!(list[1]["turn_prompt_hash"], "h2");
}

#[tokio::test]
async fn download_is_an_attachment_named_after_the_scope() {
    let srv = spawn_default(2).await;
    let resp = reqwest::get(format!("{}/ratings/download", srv.base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"ratings-Org_Set.json\""
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!([]));

    let user = survey::identity("127.0.0.1");
    let file = srv.data_dir.join(format!("ratings/Org_Set/{user}.json"));
    assert_eq!(std::fs::read_to_string(file).unwrap().trim(), "[]");
}

#[tokio::test]
async fn forwarded_clients_are_separate_users() {
    let cfg = AppConfig { identity_source: IdentitySource::ForwardedFor, ..AppConfig::default() };
    let srv = spawn(sample_items(2), cfg).await;
    let url = format!("{}/ratings", srv.base);
    let client = reqwest::Client::new();

    for (addr, hash) in [("203.0.113.1", "h0"), ("203.0.113.2", "h1")] {
        let resp = client
            .post(&url)
            .header("x-forwarded-for", addr)
            .json(&json!({"turn_prompt_hash": hash, "label": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let first: Value = client
        .get(&url)
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first.as_array().unwrap().len(), 1);
    assert_eq!(first[0]["turn_prompt_hash"], "h0");
}

#[tokio::test]
async fn frontend_falls_back_to_index() {
    let web = tempfile::tempdir().unwrap();
    write(web.path(), "index.html", "<html>survey</html>");
    write(web.path(), "app.js", "console.log(1)");

    let cfg = AppConfig { frontend_dir: Some(web.path().to_path_buf()), ..AppConfig::default() };
    let srv = spawn_default_with(cfg).await;
    let root = srv.base.trim_end_matches("/api");

    let js = reqwest::get(format!("{root}/app.js")).await.unwrap().text().await.unwrap();
    assert_eq!(js, "console.log(1)");
    let page = reqwest::get(format!("{root}/survey/step/3")).await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(page.text().await.unwrap(), "<html>survey</html>");

    let (status, _) = get_json(&format!("{}/dataset/info", srv.base)).await;
    assert_eq!(status, StatusCode::OK);
}

async fn spawn_default_with(cfg: AppConfig) -> TestServer {
    spawn(sample_items(2), cfg).await
}

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

#[tokio::test]
async fn client_session_walks_the_whole_survey() {
    let srv = spawn_default(3).await;
    let api = HttpSurveyApi::new(srv.base.clone()).unwrap();
    let mut session = SurveySession::new(api, SessionOptions::default());

    session.start().await.unwrap();
    assert_eq!(session.dataset_name(), "Org/Set");
    assert_eq!(session.total_samples(), 3);

    session.rate_good().await.unwrap();
    session.skip().await.unwrap();
    session.rate_bad().await.unwrap();
    assert!(session.is_complete());

    let (_, progress) = get_json(&format!("{}/ratings/progress", srv.base)).await;
    assert_eq!(progress["completed"], 2);

    // A new session skips what was already rated.
    session.reset();
    session.start().await.unwrap();
    let current = session.current_sample().unwrap();
    let (_, ratings) = get_json(&format!("{}/ratings", srv.base)).await;
    let rated: Vec<&str> = ratings
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["turn_prompt_hash"].as_str().unwrap())
        .collect();
    assert!(!rated.contains(&current.sample.content_hash.as_str()));
}
