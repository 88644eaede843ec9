//! Integration tests for the download pipeline
//!
//! Runs the full orchestration path (resolve → transfer → merge → finalize)
//! against an in-process fixture HTTP server, an in-memory database, and a
//! concatenating post-processor standing in for ffmpeg. No external network
//! or binaries are required.

use async_trait::async_trait;
use echoir_core::api::{CatalogClient, ClientConfig};
use echoir_core::audio::{PostProcessor, TrackMetadata};
use echoir_core::download::{DownloadRepository, ProgressSink, RepositoryConfig, TransferConfig};
use echoir_core::error::{ErrorKind, Result as EchoirResult};
use echoir_core::file;
use echoir_core::storage::{Database, Download, DownloadStatus, DownloadStore, Quality};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

// ============================================================================
// Fixture HTTP server
// ============================================================================

/// Canned behavior for one route
#[derive(Clone)]
enum Route {
    /// 200 with a JSON body
    Json(String),
    /// Empty response with the given status
    Status(u16),
    /// 200 with an octet-stream body
    Bytes(Vec<u8>),
    /// Like Bytes, but 403 unless the request carries the given header
    BytesWithAuth {
        body: Vec<u8>,
        header: (String, String),
    },
    /// First hit advertises the full length but closes after half the
    /// body; subsequent hits serve the full body
    Flaky(Vec<u8>),
    /// Serves the body in small chunks with a delay between them
    Slow {
        body: Vec<u8>,
        chunk: usize,
        delay_ms: u64,
    },
}

/// Minimal HTTP/1.1 server with a mutable route table, so stream routes can
/// embed the server's own address in playback descriptors
struct FixtureServer {
    base_url: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
}

impl FixtureServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(HashMap::new()));
        let hits: Arc<Mutex<HashMap<String, u32>>> = Arc::new(Mutex::new(HashMap::new()));

        let accept_routes = Arc::clone(&routes);
        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    break;
                };
                let routes = Arc::clone(&accept_routes);
                let hits = Arc::clone(&hits);
                tokio::spawn(async move {
                    let _ = handle_connection(sock, routes, hits).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            routes,
        }
    }

    fn add_route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn handle_connection(
    mut sock: TcpStream,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, u32>>>,
) -> std::io::Result<()> {
    // Read the request head
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = sock.read(&mut chunk).await?;
        if n == 0 || buf.len() > 16 * 1024 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/").to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let hit_count = {
        let mut hits = hits.lock().unwrap();
        let count = hits.entry(path.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let route = routes.lock().unwrap().get(&path).cloned();

    match route {
        Some(Route::Json(body)) => {
            write_response(&mut sock, 200, "application/json", body.as_bytes(), None).await?;
        }
        Some(Route::Status(status)) => {
            write_response(&mut sock, status, "text/plain", b"", None).await?;
        }
        Some(Route::Bytes(body)) => {
            write_response(&mut sock, 200, "application/octet-stream", &body, None).await?;
        }
        Some(Route::BytesWithAuth { body, header }) => {
            let provided = headers.get(&header.0.to_lowercase());
            if provided == Some(&header.1) {
                write_response(&mut sock, 200, "application/octet-stream", &body, None).await?;
            } else {
                write_response(&mut sock, 403, "text/plain", b"forbidden", None).await?;
            }
        }
        Some(Route::Flaky(body)) => {
            if hit_count == 1 {
                // Advertise everything, deliver half, drop the connection
                write_response(
                    &mut sock,
                    200,
                    "application/octet-stream",
                    &body[..body.len() / 2],
                    Some(body.len()),
                )
                .await?;
            } else {
                write_response(&mut sock, 200, "application/octet-stream", &body, None).await?;
            }
        }
        Some(Route::Slow { body, chunk, delay_ms }) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(header.as_bytes()).await?;
            for piece in body.chunks(chunk) {
                sock.write_all(piece).await?;
                sock.flush().await?;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
        None => {
            write_response(&mut sock, 404, "text/plain", b"not found", None).await?;
        }
    }

    sock.shutdown().await
}

async fn write_response(
    sock: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
    advertised_len: Option<usize>,
) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        advertised_len.unwrap_or(body.len()),
        content_type,
    );
    sock.write_all(header.as_bytes()).await?;
    sock.write_all(body).await?;
    sock.flush().await
}

fn playback_json(
    track_id: i64,
    quality: Quality,
    urls: &[String],
    sizes: &[Option<u64>],
    auth_header: Option<(&str, &str)>,
) -> String {
    let mut headers = serde_json::Map::new();
    if let Some((name, value)) = auth_header {
        headers.insert(name.to_string(), serde_json::Value::String(value.to_string()));
    }

    serde_json::json!({
        "trackId": track_id,
        "quality": quality.as_str(),
        "codec": if quality.is_lossless() { "flac" } else { "aac" },
        "urls": urls,
        "sizes": sizes,
        "headers": headers,
    })
    .to_string()
}

// ============================================================================
// Merge-stage test double
// ============================================================================

/// Concatenates the transferred payloads instead of invoking ffmpeg, then
/// finalizes through the same staged-rename path as production
struct ConcatPostProcessor;

#[async_trait]
impl PostProcessor for ConcatPostProcessor {
    async fn finalize(
        &self,
        local_paths: &[PathBuf],
        quality: Quality,
        metadata: &TrackMetadata,
        album_dir: &Path,
        scratch_dir: &Path,
    ) -> EchoirResult<PathBuf> {
        let mut data = Vec::new();
        for path in local_paths {
            data.extend(tokio::fs::read(path).await?);
        }

        let merged = scratch_dir.join(format!("merged.{}", quality.extension()));
        tokio::fs::write(&merged, &data).await?;

        let name = file::track_file_name(&metadata.title, metadata.explicit, quality.extension());
        let final_path = file::avoid_collision(album_dir.join(name));
        file::place_atomically(&merged, &final_path).await?;
        Ok(final_path)
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    store: Arc<DownloadStore>,
    repo: Arc<DownloadRepository>,
    library: tempfile::TempDir,
    staging: tempfile::TempDir,
}

async fn harness(server: &FixtureServer, max_retries: u32) -> Harness {
    let db = Database::new_in_memory().await.unwrap();
    let store = Arc::new(DownloadStore::new(db));

    let client = Arc::new(
        CatalogClient::new(
            ClientConfig::builder()
                .base_url(server.base_url.clone())
                .max_retries(0)
                .build()
                .unwrap(),
        )
        .unwrap(),
    );

    let library = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let config = RepositoryConfig::new(
        library.path().to_path_buf(),
        staging.path().to_path_buf(),
    )
    .transfer_config(TransferConfig {
        max_retries,
        timeout: Duration::from_secs(30),
    });

    let repo = DownloadRepository::new(
        Arc::clone(&store),
        client,
        Arc::new(ConcatPostProcessor),
        config,
    )
    .unwrap();

    Harness {
        store,
        repo,
        library,
        staging,
    }
}

fn sample_download(track_id: i64, quality: Quality, immersive: bool, explicit: bool) -> Download {
    Download::new(
        track_id,
        Some(900),
        format!("Track {}", track_id),
        "Test Artist".to_string(),
        Some("Test Album".to_string()),
        None,
        187,
        explicit,
        quality,
        false,
        immersive,
    )
}

fn collecting_sink() -> (ProgressSink, Arc<Mutex<Vec<i32>>>) {
    let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: ProgressSink = Arc::new(move |percent| {
        sink_seen.lock().unwrap().push(percent);
    });
    (sink, seen)
}

/// Record the status sequence a feed subscriber observes for one id
fn record_statuses(
    store: &DownloadStore,
    id: String,
) -> (tokio::task::JoinHandle<()>, Arc<Mutex<Vec<DownloadStatus>>>) {
    let mut rx = store.download_history();
    let seen: Arc<Mutex<Vec<DownloadStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let task_seen = Arc::clone(&seen);

    let handle = tokio::spawn(async move {
        loop {
            {
                let snapshot = rx.borrow_and_update().clone();
                if let Some(download) = snapshot.iter().find(|d| d.id == id) {
                    let mut seen = task_seen.lock().unwrap();
                    if seen.last() != Some(&download.status) {
                        seen.push(download.status);
                    }
                }
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    });

    (handle, seen)
}

/// Assert `observed` is an in-order subsequence of `expected`
fn assert_ordered_subsequence(observed: &[DownloadStatus], expected: &[DownloadStatus]) {
    let mut expected_iter = expected.iter();
    for status in observed {
        assert!(
            expected_iter.any(|e| e == status),
            "status sequence {:?} is not an ordered subsequence of {:?}",
            observed,
            expected
        );
    }
}

async fn wait_for_status(store: &DownloadStore, id: &str, status: DownloadStatus) {
    timeout(Duration::from_secs(10), async {
        loop {
            if let Some(d) = store.get_by_id(id).await.unwrap() {
                if d.status == status {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("timed out waiting for status");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_lossless_download_completes() {
    let payload = vec![0xA5u8; 256 * 1024];

    let server = FixtureServer::start().await;
    server.add_route(
        "/playback",
        Route::Json(playback_json(
            42,
            Quality::Lossless,
            &[server.url("/streams/42.flac")],
            &[Some(payload.len() as u64)],
            Some(("X-Playback-Token", "tok-42")),
        )),
    );
    server.add_route(
        "/streams/42.flac",
        Route::BytesWithAuth {
            body: payload.clone(),
            header: ("X-Playback-Token".to_string(), "tok-42".to_string()),
        },
    );

    let h = harness(&server, 0).await;
    let download = sample_download(42, Quality::Lossless, false, false);
    let (recorder, statuses) = record_statuses(&h.store, download.id.clone());

    h.repo.save_download(&download).await.unwrap();

    let (sink, percents) = collecting_sink();
    let path = h
        .repo
        .process_download(&download.id, 42, Quality::Lossless, false, false, sink)
        .await
        .unwrap();

    // Completed record carries the path; the file exists and is non-empty
    let stored = h.store.get_by_id(&download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert_eq!(stored.file_path.as_deref(), Some(path.as_str()));

    let metadata = tokio::fs::metadata(&path).await.unwrap();
    assert_eq!(metadata.len(), payload.len() as u64);

    // Placed under the clean album directory
    assert!(path.starts_with(h.library.path().join("Test Album").to_str().unwrap()));

    // Sink saw a monotone sequence ending at 100
    let percents = percents.lock().unwrap().clone();
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percents.last().unwrap(), 100);

    // Subscribers saw statuses in lifecycle order only
    recorder.abort();
    let observed = statuses.lock().unwrap().clone();
    assert_ordered_subsequence(
        &observed,
        &[
            DownloadStatus::Queued,
            DownloadStatus::Downloading,
            DownloadStatus::Merging,
            DownloadStatus::Completed,
        ],
    );
    assert_eq!(observed.last(), Some(&DownloadStatus::Completed));
}

#[tokio::test]
async fn test_immersive_download_merges_both_streams() {
    let base = b"BASE-AUDIO-PAYLOAD".repeat(512);
    let spatial = b"SPATIAL-PAYLOAD".repeat(512);

    let server = FixtureServer::start().await;
    server.add_route(
        "/playback",
        Route::Json(playback_json(
            7,
            Quality::DolbyAtmos,
            &[server.url("/streams/7-base"), server.url("/streams/7-spatial")],
            &[Some(base.len() as u64), Some(spatial.len() as u64)],
            None,
        )),
    );
    server.add_route("/streams/7-base", Route::Bytes(base.clone()));
    server.add_route("/streams/7-spatial", Route::Bytes(spatial.clone()));

    let h = harness(&server, 0).await;
    let download = sample_download(7, Quality::DolbyAtmos, true, false);
    h.repo.save_download(&download).await.unwrap();

    let (sink, _) = collecting_sink();
    let path = h
        .repo
        .process_download(&download.id, 7, Quality::DolbyAtmos, true, true, sink)
        .await
        .unwrap();

    // Both streams were fetched and combined into one output file
    let contents = tokio::fs::read(&path).await.unwrap();
    let mut expected = base.clone();
    expected.extend(&spatial);
    assert_eq!(contents, expected);

    let stored = h.store.get_by_id(&download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Completed);
}

#[tokio::test]
async fn test_quality_unavailable_fails_without_downloading_transition() {
    let server = FixtureServer::start().await;
    server.add_route("/playback", Route::Status(404));

    let h = harness(&server, 0).await;
    let download = sample_download(9, Quality::HiResLossless, false, false);
    let (recorder, statuses) = record_statuses(&h.store, download.id.clone());
    h.repo.save_download(&download).await.unwrap();

    let (sink, _) = collecting_sink();
    let err = h
        .repo
        .process_download(&download.id, 9, Quality::HiResLossless, false, false, sink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resolution);

    let stored = h.store.get_by_id(&download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Failed);
    assert_eq!(stored.failure_kind(), Some(ErrorKind::Resolution));
    assert_eq!(stored.progress, 0);
    assert!(stored.file_path.is_none());

    // No DOWNLOADING transition was ever visible to subscribers
    recorder.abort();
    let observed = statuses.lock().unwrap().clone();
    assert!(!observed.contains(&DownloadStatus::Downloading));
    assert!(!observed.contains(&DownloadStatus::Merging));
}

#[tokio::test]
async fn test_interrupted_transfer_cleans_up_and_fresh_call_succeeds() {
    let payload = vec![0x5Au8; 128 * 1024];

    let server = FixtureServer::start().await;
    server.add_route(
        "/playback",
        Route::Json(playback_json(
            11,
            Quality::High,
            &[server.url("/streams/11.m4a")],
            &[Some(payload.len() as u64)],
            None,
        )),
    );
    server.add_route("/streams/11.m4a", Route::Flaky(payload.clone()));

    let h = harness(&server, 0).await;
    let download = sample_download(11, Quality::High, false, false);
    h.repo.save_download(&download).await.unwrap();

    let (sink, _) = collecting_sink();
    let err = h
        .repo
        .process_download(&download.id, 11, Quality::High, false, false, sink)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transfer);

    // Nothing left behind: no staging directory, no file in the library
    assert!(!h.staging.path().join(&download.id).exists());
    let album_dir = h.library.path().join("Test Album");
    if album_dir.exists() {
        assert_eq!(std::fs::read_dir(&album_dir).unwrap().count(), 0);
    }

    let stored = h.store.get_by_id(&download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Failed);
    assert_eq!(stored.failure_kind(), Some(ErrorKind::Transfer));

    // A fresh invocation for the same attempt succeeds (the fixture serves
    // the full body from the second hit on)
    let (sink, _) = collecting_sink();
    let path = h
        .repo
        .process_download(&download.id, 11, Quality::High, false, false, sink)
        .await
        .unwrap();

    let metadata = tokio::fs::metadata(&path).await.unwrap();
    assert_eq!(metadata.len(), payload.len() as u64);

    let stored = h.store.get_by_id(&download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Completed);
}

#[tokio::test]
async fn test_cancel_mid_download_leaves_no_artifacts() {
    let payload = vec![0x33u8; 400 * 1024];

    let server = FixtureServer::start().await;
    server.add_route(
        "/playback",
        Route::Json(playback_json(
            13,
            Quality::Lossless,
            &[server.url("/streams/13.flac")],
            &[Some(payload.len() as u64)],
            None,
        )),
    );
    server.add_route(
        "/streams/13.flac",
        Route::Slow {
            body: payload,
            chunk: 8 * 1024,
            delay_ms: 25,
        },
    );

    let h = harness(&server, 0).await;
    let download = sample_download(13, Quality::Lossless, false, false);
    h.repo.save_download(&download).await.unwrap();

    let (sink, _) = collecting_sink();
    h.repo
        .spawn_download(&download.id, 13, Quality::Lossless, false, false, sink)
        .await
        .unwrap();

    wait_for_status(&h.store, &download.id, DownloadStatus::Downloading).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    h.repo.cancel(&download.id).await.unwrap();

    // Worker wound down within the grace period
    assert!(!h.repo.is_active(&download.id).await);

    // No staging leftovers, nothing in the library
    assert!(!h.staging.path().join(&download.id).exists());
    let album_dir = h.library.path().join("Test Album");
    if album_dir.exists() {
        assert_eq!(std::fs::read_dir(&album_dir).unwrap().count(), 0);
    }

    let stored = h.store.get_by_id(&download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Failed);
    assert_eq!(stored.failure_kind(), Some(ErrorKind::Cancelled));
}

#[tokio::test]
async fn test_explicit_and_clean_albums_get_distinct_directories() {
    let payload = vec![0x11u8; 32 * 1024];

    let server = FixtureServer::start().await;
    server.add_route(
        "/playback",
        Route::Json(playback_json(
            21,
            Quality::Lossless,
            &[server.url("/streams/21.flac")],
            &[Some(payload.len() as u64)],
            None,
        )),
    );
    server.add_route("/streams/21.flac", Route::Bytes(payload));

    let h = harness(&server, 0).await;

    let clean = sample_download(21, Quality::Lossless, false, false);
    let explicit = sample_download(21, Quality::Lossless, false, true);
    h.repo.save_download(&clean).await.unwrap();
    h.repo.save_download(&explicit).await.unwrap();

    let (sink, _) = collecting_sink();
    let clean_path = h
        .repo
        .process_download(&clean.id, 21, Quality::Lossless, false, false, sink.clone())
        .await
        .unwrap();
    let explicit_path = h
        .repo
        .process_download(&explicit.id, 21, Quality::Lossless, false, false, sink)
        .await
        .unwrap();

    let clean_dir = Path::new(&clean_path).parent().unwrap().to_path_buf();
    let explicit_dir = Path::new(&explicit_path).parent().unwrap().to_path_buf();

    assert_ne!(clean_dir, explicit_dir);
    assert_eq!(clean_dir, h.library.path().join("Test Album"));
    assert_eq!(explicit_dir, h.library.path().join("Test Album [E]"));
    assert!(explicit_path.ends_with("Track 21 [E].flac"));
}

#[tokio::test]
async fn test_concurrent_downloads_proceed_independently() {
    let payload = vec![0x01u8; 64 * 1024];

    let server = FixtureServer::start().await;
    server.add_route(
        "/playback",
        Route::Json(playback_json(
            31,
            Quality::High,
            &[server.url("/streams/31.m4a")],
            &[Some(payload.len() as u64)],
            None,
        )),
    );
    server.add_route("/streams/31.m4a", Route::Bytes(payload));

    let h = harness(&server, 0).await;

    // Two attempts for the same track with distinct attempt ids; the
    // explicit flag routes them into different album directories
    let first = sample_download(31, Quality::High, false, false);
    let second = sample_download(31, Quality::High, false, true);
    h.repo.save_download(&first).await.unwrap();
    h.repo.save_download(&second).await.unwrap();

    let (sink_a, _) = collecting_sink();
    let (sink_b, _) = collecting_sink();

    let repo_a = Arc::clone(&h.repo);
    let repo_b = Arc::clone(&h.repo);
    let id_a = first.id.clone();
    let id_b = second.id.clone();

    let (ra, rb) = tokio::join!(
        tokio::spawn(async move {
            repo_a
                .process_download(&id_a, 31, Quality::High, false, false, sink_a)
                .await
        }),
        tokio::spawn(async move {
            repo_b
                .process_download(&id_b, 31, Quality::High, false, false, sink_b)
                .await
        }),
    );

    let path_a = ra.unwrap().unwrap();
    let path_b = rb.unwrap().unwrap();

    // Same track downloaded twice: distinct attempts, distinct files
    assert_ne!(path_a, path_b);
    for id in [&first.id, &second.id] {
        let stored = h.store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Completed);
    }

    let attempts = h.store.get_by_track_id(31).await.unwrap();
    assert_eq!(attempts.len(), 2);
}

#[tokio::test]
async fn test_restart_recovery_requeues_interrupted_records() {
    let db = Database::new_in_memory().await.unwrap();
    let store = DownloadStore::new(db);

    let stuck = sample_download(51, Quality::High, false, false);
    store.save(&stuck).await.unwrap();
    store
        .update_status(&stuck.id, DownloadStatus::Downloading)
        .await
        .unwrap();
    store.update_progress(&stuck.id, 37).await.unwrap();

    let reset = store.requeue_interrupted().await.unwrap();
    assert_eq!(reset, 1);

    let recovered = store.get_by_id(&stuck.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, DownloadStatus::Queued);
    assert_eq!(recovered.progress, 0);

    // Terminal records are untouched
    let done = sample_download(52, Quality::High, false, false);
    store.save(&done).await.unwrap();
    store
        .update_file_path(&done.id, "/music/somewhere.flac")
        .await
        .unwrap();
    assert_eq!(store.requeue_interrupted().await.unwrap(), 0);
}
