#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lyricrelay_core::{Clock, LyricsService, ManualClock, ProviderConfig};
use lyricrelay_musixmatch::{MusixmatchProvider, TokenCache};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const TOKEN: &str = "stub-token";

/// Stand-in for the provider's desktop API.
#[derive(Default)]
struct Upstream {
    token_calls: AtomicUsize,
    fail_token: bool,
    tracks: Vec<(u64, &'static str, &'static str)>,
    lyrics: HashMap<u64, &'static str>,
    requests: Mutex<Vec<(String, HashMap<String, String>)>>,
}

impl Upstream {
    fn with_track(id: u64, name: &'static str, artist: &'static str, lrc: &'static str) -> Self {
        Self {
            tracks: vec![(id, name, artist)],
            lyrics: HashMap::from([(id, lrc)]),
            ..Self::default()
        }
    }

    fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    fn last_params(&self, action: &str) -> HashMap<String, String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(a, _)| a == action)
            .map(|(_, params)| params.clone())
            .expect("action was never requested")
    }

    fn record(&self, action: &str, params: &HashMap<String, String>) {
        self.requests
            .lock()
            .unwrap()
            .push((action.to_string(), params.clone()));
    }
}

fn envelope(status: u16, body: Value) -> Json<Value> {
    Json(json!({"message": {"header": {"status_code": status}, "body": body}}))
}

/// Reject calls missing the fixed headers or a valid `usertoken`.
fn check_request(headers: &HeaderMap, params: &HashMap<String, String>, authed: bool) -> bool {
    let has_headers = headers.get("cookie").is_some_and(|v| v == "AWSELBCORS=0; AWSELB=0;")
        && headers
            .get("authority")
            .is_some_and(|v| v == "apic-desktop.musixmatch.com");
    let has_app_id = params.get("app_id").is_some_and(|v| v == "web-desktop-app-v1.0");
    let has_token = !authed || params.get("usertoken").is_some_and(|v| v == TOKEN);
    has_headers && has_app_id && has_token
}

async fn token_get(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    up.token_calls.fetch_add(1, Ordering::SeqCst);
    up.record("token.get", &params);
    if !check_request(&headers, &params, false) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if up.fail_token {
        return envelope(401, json!("")).into_response();
    }
    envelope(200, json!({"user_token": TOKEN})).into_response()
}

async fn track_search(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    up.record("track.search", &params);
    if !check_request(&headers, &params, true) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let track_list: Vec<Value> = up
        .tracks
        .iter()
        .map(|(id, name, artist)| {
            json!({"track": {"track_id": id, "track_name": name, "artist_name": artist}})
        })
        .collect();
    envelope(200, json!({"track_list": track_list})).into_response()
}

async fn subtitle_get(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    up.record("track.subtitle.get", &params);
    if !check_request(&headers, &params, true) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let lrc = params
        .get("track_id")
        .and_then(|id| id.parse::<u64>().ok())
        .and_then(|id| up.lyrics.get(&id));
    match lrc {
        Some(lrc) => envelope(200, json!({"subtitle": {"subtitle_body": lrc}})).into_response(),
        None => envelope(404, json!([])).into_response(),
    }
}

async fn macro_subtitles_get(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    up.record("macro.subtitles.get", &params);
    if !check_request(&headers, &params, true) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let entries = json!([
        {"text": "hi", "time": {"total": 1.23, "minutes": 0, "seconds": 1, "hundredths": 23}},
        {"text": "", "time": {"total": 65.0, "minutes": 1, "seconds": 5, "hundredths": 0}}
    ]);
    let subtitles = envelope(
        200,
        json!({"subtitle_list": [{"subtitle": {"subtitle_body": entries.to_string()}}]}),
    );
    envelope(200, json!({"macro_calls": {"track.subtitles.get": subtitles.0}})).into_response()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

async fn spawn_upstream(upstream: &Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/ws/1.1/token.get", get(token_get))
        .route("/ws/1.1/track.search", get(track_search))
        .route("/ws/1.1/track.subtitle.get", get(subtitle_get))
        .route("/ws/1.1/macro.subtitles.get", get(macro_subtitles_get))
        .with_state(upstream.clone());
    format!("http://{}/ws/1.1", spawn(app).await)
}

fn provider_config(base_url: String) -> ProviderConfig {
    ProviderConfig {
        base_url,
        ..ProviderConfig::default()
    }
}

/// Start a stub upstream and a relay in front of it; returns the relay base URL.
async fn start(upstream: &Arc<Upstream>) -> String {
    let config = provider_config(spawn_upstream(upstream).await);
    let provider = MusixmatchProvider::new(&config).unwrap();
    let relay = lyricrelay_server::router(LyricsService::new(Arc::new(provider)));
    format!("http://{}", spawn(relay).await)
}

async fn get_text(url: &str) -> (StatusCode, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_welcome() {
    let upstream = Arc::new(Upstream::default());
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!("{relay}/api")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, lyricrelay_server::WELCOME_MESSAGE);
    assert_eq!(upstream.token_calls(), 0);
}

#[tokio::test]
async fn test_lyrics_for_query() {
    let upstream = Arc::new(Upstream::with_track(42, "X", "Y", "[00:00.00] la"));
    let relay = start(&upstream).await;

    let response = reqwest::get(format!("{relay}/api/lyrics/X%20Y")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body = response.text().await.unwrap();
    assert!(body.ends_with("}\n"));
    assert!(body.starts_with("{\n  \"code\": 200,"));

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        json!({"code": 200, "message": "success", "lyrics": {"00:00.00": "la"}})
    );

    let search = upstream.last_params("track.search");
    assert_eq!(search["q"], "X Y");
    assert_eq!(search["page_size"], "5");
    assert_eq!(search["s_track_rating"], "desc");
    let subtitle = upstream.last_params("track.subtitle.get");
    assert_eq!(subtitle["track_id"], "42");
    assert_eq!(subtitle["subtitle_format"], "lrc");
}

#[tokio::test]
async fn test_lyrics_keeps_line_order_and_missing_values() {
    let upstream = Arc::new(Upstream::with_track(
        1,
        "Song",
        "Artist",
        "[00:01.00] one [00:02.00] two [00:03.00]",
    ));
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!("{relay}/api/lyrics/Song%20Artist")).await;
    assert_eq!(status, StatusCode::OK);
    let lyrics_start = body.find("\"lyrics\"").unwrap();
    let lyrics = &body[lyrics_start..];
    assert!(lyrics.find("00:01.00").unwrap() < lyrics.find("00:02.00").unwrap());

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json["lyrics"],
        json!({"00:01.00": "one", "00:02.00": "two", "00:03.00]": null})
    );
}

#[tokio::test]
async fn test_search_prefers_candidate_named_in_query() {
    let upstream = Arc::new(Upstream {
        tracks: vec![(1, "Intro", "Band"), (2, "Song", "Artist")],
        lyrics: HashMap::from([(1, "[00:00.00] wrong"), (2, "[00:01.00] hit")]),
        ..Upstream::default()
    });
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!("{relay}/api/lyrics/Song%20Artist%20remastered")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["lyrics"], json!({"00:01.00": "hit"}));

    let (_, body) = get_text(&format!("{relay}/api/lyrics/unrelated")).await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["lyrics"], json!({"00:00.00": "wrong"}));
}

#[tokio::test]
async fn test_empty_search_result() {
    let upstream = Arc::new(Upstream::default());
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!("{relay}/api/lyrics/nothing")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to search track");
}

#[tokio::test]
async fn test_missing_lyrics() {
    let upstream = Arc::new(Upstream {
        tracks: vec![(9, "No", "Lyrics")],
        ..Upstream::default()
    });
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!("{relay}/api/lyrics/No%20Lyrics")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to retrieve lyrics");
}

#[tokio::test]
async fn test_token_failure_fails_the_search() {
    let upstream = Arc::new(Upstream {
        fail_token: true,
        ..Upstream::with_track(42, "X", "Y", "[00:00.00] la")
    });
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!("{relay}/api/lyrics/X%20Y")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to search track");
    assert_eq!(upstream.token_calls(), 1);

    // Nothing was cached, so the next request tries again
    let _ = get_text(&format!("{relay}/api/lyrics/X%20Y")).await;
    assert_eq!(upstream.token_calls(), 2);
}

#[tokio::test]
async fn test_token_is_reused_across_requests() {
    let upstream = Arc::new(Upstream::with_track(42, "X", "Y", "[00:00.00] la"));
    let relay = start(&upstream).await;

    for _ in 0..3 {
        let (status, _) = get_text(&format!("{relay}/api/lyrics/X%20Y")).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(upstream.token_calls(), 1);
}

#[tokio::test]
async fn test_token_is_refreshed_after_expiry() {
    let upstream = Arc::new(Upstream::with_track(42, "X", "Y", "[00:00.00] la"));
    let config = provider_config(spawn_upstream(&upstream).await);

    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let shared: Arc<dyn Clock> = clock.clone();
    let tokens = Arc::new(TokenCache::new(config.token_ttl(), shared));
    let provider = MusixmatchProvider::with_token_cache(&config, tokens).unwrap();
    let relay = spawn(lyricrelay_server::router(LyricsService::new(Arc::new(
        provider,
    ))))
    .await;
    let url = format!("http://{relay}/api/lyrics/X%20Y");

    get_text(&url).await;
    clock.advance(Duration::from_secs(599));
    get_text(&url).await;
    assert_eq!(upstream.token_calls(), 1);

    clock.advance(Duration::from_secs(2));
    let (status, _) = get_text(&url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(upstream.token_calls(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_token() {
    let upstream = Arc::new(Upstream::with_track(42, "X", "Y", "[00:00.00] la"));
    let relay = start(&upstream).await;
    let url = format!("{relay}/api/lyrics/X%20Y");

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let url = url.clone();
            tokio::spawn(async move { get_text(&url).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().0, StatusCode::OK);
    }
    assert_eq!(upstream.token_calls(), 1);
}

#[tokio::test]
async fn test_alternative_lyrics() {
    let upstream = Arc::new(Upstream::default());
    let relay = start(&upstream).await;

    let (status, body) = get_text(&format!(
        "{relay}/api/alternative?title=Caf%C3%A9%20Song&artist=The%20Band&duration=215.5"
    ))
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        json!({"code": 200, "message": "success", "lyrics": "[00:01.23]hi\n[01:05.00]♪\n"})
    );

    let params = upstream.last_params("macro.subtitles.get");
    assert_eq!(params["q_track"], "Café Song");
    assert_eq!(params["q_artist"], "The Band");
    assert_eq!(params["q_duration"], "215.5");
    assert_eq!(params["namespace"], "lyrics_richsynched");
    assert_eq!(params["subtitle_format"], "mxm");
}

#[tokio::test]
async fn test_alternative_without_duration_omits_it() {
    let upstream = Arc::new(Upstream::default());
    let relay = start(&upstream).await;

    let (status, _) = get_text(&format!("{relay}/api/alternative?title=T&artist=A")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!upstream
        .last_params("macro.subtitles.get")
        .contains_key("q_duration"));
}

#[tokio::test]
async fn test_upstream_unreachable() {
    // Bind then drop to get a port nothing listens on
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let config = provider_config(format!("http://{addr}/ws/1.1"));
    let provider = MusixmatchProvider::new(&config).unwrap();
    let relay = spawn(lyricrelay_server::router(LyricsService::new(Arc::new(
        provider,
    ))))
    .await;

    let (status, body) = get_text(&format!("http://{relay}/api/alternative?title=T&artist=A")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to retrieve alternative lyrics");
}

#[tokio::test]
async fn test_fetch_token_forces_refresh() {
    let upstream = Arc::new(Upstream::default());
    let config = provider_config(spawn_upstream(&upstream).await);
    let provider = MusixmatchProvider::new(&config).unwrap();

    assert_eq!(provider.fetch_token().await.unwrap(), TOKEN);
    assert_eq!(provider.fetch_token().await.unwrap(), TOKEN);
    assert_eq!(upstream.token_calls(), 2);
    assert_eq!(provider.token_cache().load().await.unwrap().value, TOKEN);

    let failing = Arc::new(Upstream {
        fail_token: true,
        ..Upstream::default()
    });
    let config = provider_config(spawn_upstream(&failing).await);
    let provider = MusixmatchProvider::new(&config).unwrap();
    let err = provider.fetch_token().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to retrieve access token");
    assert!(provider.token_cache().load().await.is_err());
}
