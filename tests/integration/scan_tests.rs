use onionshot::config::ScanConfig;
use onionshot::output::{OutputLayout, RunLog, Tally};
use onionshot::scanner::{
    run_scan, store_snapshot, with_deadline, CaptureError, Capturer, Orchestrator,
};
use onionshot::targets::Target;
use onionshot::transport::Transport;
use onionshot::{RunState, ScanError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// How the fake capturer behaves for every target
#[derive(Clone, Copy)]
enum Shot {
    Succeed,
    TimeOut,
    Empty,
}

struct FakeCapturer {
    shot: Shot,
}

impl Capturer for FakeCapturer {
    async fn capture(&self, _target: &Target, output: &Path) -> Result<(), CaptureError> {
        match self.shot {
            Shot::Succeed => store_snapshot(output, b"\x89PNG\r\n\x1a\nfake"),
            Shot::TimeOut => {
                with_deadline(Duration::from_millis(20), async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    store_snapshot(output, b"too late")
                })
                .await
            }
            Shot::Empty => store_snapshot(output, &[]),
        }
    }
}

/// Scratch output root plus run log for one test
struct Workspace {
    _dir: TempDir,
    layout: OutputLayout,
    log_path: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path().join("output"));
        layout.ensure_dirs().expect("Failed to create output dirs");
        let log_path = dir.path().join("scan_report.log");
        Self {
            _dir: dir,
            layout,
            log_path,
        }
    }

    fn open_log(&self) -> RunLog {
        RunLog::create(&self.log_path).expect("Failed to open run log")
    }

    fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log_path)
            .expect("Failed to read run log")
            .lines()
            .map(String::from)
            .collect()
    }

    fn html_files(&self) -> Vec<PathBuf> {
        list_files(&self.layout.html_dir())
    }

    fn png_files(&self) -> Vec<PathBuf> {
        list_files(&self.layout.screenshot_dir())
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn direct_transport() -> Transport {
    Transport::direct()
}

fn tagged<'a>(lines: &'a [String], tag: &str) -> Vec<&'a String> {
    lines.iter().filter(|l| l.starts_with(tag)).collect()
}

async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Runs targets through a document-only orchestrator and finishes the run
async fn run_document_only(ws: &Workspace, targets: &[Target]) -> Tally {
    let mut orchestrator = Orchestrator::document_only(direct_transport(), ws.layout.clone(), ws.open_log());
    let tally = orchestrator.run(targets).await;
    orchestrator.finish(&tally);
    assert_eq!(orchestrator.state(), RunState::Closed);
    tally
}

async fn run_with_capture(ws: &Workspace, targets: &[Target], shot: Shot) -> Tally {
    let mut orchestrator = Orchestrator::new(
        direct_transport(),
        Some(FakeCapturer { shot }),
        ws.layout.clone(),
        ws.open_log(),
    );
    let tally = orchestrator.run(targets).await;
    orchestrator.finish(&tally);
    tally
}

#[tokio::test]
async fn test_single_target_document_only() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        ResponseTemplate::new(200).set_body_string("<html><body>hidden service</body></html>"),
    )
    .await;

    let ws = Workspace::new();
    let target = Target::new(format!("{}/", server.uri()));
    let tally = run_document_only(&ws, &[target.clone()]).await;

    assert_eq!(tally, Tally { success: 1, failure: 0 });

    let lines = ws.log_lines();
    let ok = tagged(&lines, "[OK]");
    assert_eq!(ok.len(), 1);
    assert!(ok[0].contains("saved_html="));
    assert!(!ok[0].contains("saved_png="));
    assert!(!ok[0].contains("screenshot_fail="));

    let html = ws.html_files();
    assert_eq!(html.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&html[0]).unwrap(),
        "<html><body>hidden service</body></html>"
    );
    assert!(ws.png_files().is_empty());
}

#[tokio::test]
async fn test_bad_status_writes_nothing() {
    let server = MockServer::start().await;
    mount(&server, "/down", ResponseTemplate::new(500).set_body_string("error page")).await;

    let ws = Workspace::new();
    let tally = run_document_only(&ws, &[Target::new(format!("{}/down", server.uri()))]).await;

    assert_eq!(tally.failure, 1);
    assert_eq!(tally.success, 0);

    let lines = ws.log_lines();
    let err = tagged(&lines, "[ERR]");
    assert_eq!(err.len(), 1);
    assert!(err[0].contains("status=500"));
    assert!(tagged(&lines, "[OK]").is_empty());

    assert!(ws.html_files().is_empty());
    assert!(ws.png_files().is_empty());
}

#[tokio::test]
async fn test_capture_timeout_keeps_document() {
    let server = MockServer::start().await;
    mount(&server, "/slow-render", ResponseTemplate::new(200).set_body_string("<html/>")).await;

    let ws = Workspace::new();
    let tally = run_with_capture(
        &ws,
        &[Target::new(format!("{}/slow-render", server.uri()))],
        Shot::TimeOut,
    )
    .await;

    // Partial success still counts as success
    assert_eq!(tally, Tally { success: 1, failure: 0 });

    let lines = ws.log_lines();
    let ok = tagged(&lines, "[OK]");
    assert_eq!(ok.len(), 1);
    assert!(ok[0].contains("saved_html="));
    assert!(ok[0].contains("screenshot_fail=timed out"));

    assert_eq!(ws.html_files().len(), 1);
    assert!(ws.png_files().is_empty());
}

#[tokio::test]
async fn test_empty_snapshot_is_capture_failure() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(200).set_body_string("<html/>")).await;

    let ws = Workspace::new();
    let tally = run_with_capture(&ws, &[Target::new(server.uri())], Shot::Empty).await;

    assert_eq!(tally.success, 1);
    let lines = ws.log_lines();
    assert!(tagged(&lines, "[OK]")[0].contains("screenshot_fail=empty png buffer"));
    assert_eq!(ws.html_files().len(), 1);
    assert!(ws.png_files().is_empty());
}

#[tokio::test]
async fn test_capture_success_saves_both_artifacts() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(200).set_body_string("<html/>")).await;

    let ws = Workspace::new();
    let target = Target::new(server.uri());
    let tally = run_with_capture(&ws, &[target], Shot::Succeed).await;

    assert_eq!(tally.success, 1);
    let lines = ws.log_lines();
    let ok = tagged(&lines, "[OK]");
    assert!(ok[0].contains("saved_png="));

    let html = ws.html_files();
    let png = ws.png_files();
    assert_eq!(html.len(), 1);
    assert_eq!(png.len(), 1);
    // Both artifacts share the basename
    assert_eq!(html[0].file_stem(), png[0].file_stem());
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_later_targets() {
    let server = MockServer::start().await;
    mount(&server, "/gone", ResponseTemplate::new(404)).await;
    mount(&server, "/fine", ResponseTemplate::new(200).set_body_string("fine")).await;

    let refused = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    };

    let targets = vec![
        Target::new(format!("{}/gone", server.uri())),
        Target::new(refused),
        Target::new(format!("{}/fine", server.uri())),
    ];

    let ws = Workspace::new();
    let tally = run_document_only(&ws, &targets).await;

    assert_eq!(tally, Tally { success: 1, failure: 2 });
    assert_eq!(tally.total(), targets.len() as u64);

    let lines = ws.log_lines();
    let err = tagged(&lines, "[ERR]");
    assert_eq!(err.len(), 2);
    assert!(err[0].contains("status=404"));
    assert!(err[1].contains("status=0"));
    assert!(tagged(&lines, "[OK]")[0].contains("/fine"));
    assert_eq!(ws.html_files().len(), 1);
}

#[tokio::test]
async fn test_empty_body_warns_but_saves() {
    let server = MockServer::start().await;
    mount(&server, "/blank", ResponseTemplate::new(200)).await;

    let ws = Workspace::new();
    let tally = run_document_only(&ws, &[Target::new(format!("{}/blank", server.uri()))]).await;

    assert_eq!(tally.success, 1);
    let lines = ws.log_lines();
    let warn = tagged(&lines, "[WARN]");
    assert_eq!(warn.len(), 1);
    assert!(warn[0].contains("empty HTML body"));

    let html = ws.html_files();
    assert_eq!(html.len(), 1);
    assert_eq!(std::fs::metadata(&html[0]).unwrap().len(), 0);
}

#[tokio::test]
async fn test_html_write_failure_counts_as_failure() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(200).set_body_string("<html/>")).await;

    let dir = TempDir::new().unwrap();
    // Directories are never created, so the write must fail
    let layout = OutputLayout::new(dir.path().join("missing"));
    let log_path = dir.path().join("scan_report.log");
    let log = RunLog::create(&log_path).unwrap();

    let mut orchestrator = Orchestrator::new(
        direct_transport(),
        Some(FakeCapturer { shot: Shot::Succeed }),
        layout,
        log,
    );
    let tally = orchestrator.run(&[Target::new(server.uri())]).await;
    orchestrator.finish(&tally);

    assert_eq!(tally, Tally { success: 0, failure: 1 });
    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("write_html_fail="));
    assert!(!content.contains("[OK]"));
}

#[tokio::test]
async fn test_log_shape_and_line_count() {
    let server = MockServer::start().await;
    mount(&server, "/a", ResponseTemplate::new(200).set_body_string("a")).await;
    mount(&server, "/b", ResponseTemplate::new(503)).await;

    let targets = vec![
        Target::new(format!("{}/a", server.uri())),
        Target::new(format!("{}/b", server.uri())),
        Target::new(format!("{}/a", server.uri())),
    ];

    let ws = Workspace::new();
    let log = ws.open_log();
    log.write_line("=== Scan started at test ===").unwrap();
    let mut orchestrator = Orchestrator::document_only(direct_transport(), ws.layout.clone(), log);
    let tally = orchestrator.run(&targets).await;
    orchestrator.finish(&tally);

    let lines = ws.log_lines();
    assert!(lines.len() >= 2 * targets.len() + 2);
    assert_eq!(tagged(&lines, "[INFO] Scanning:").len(), targets.len());

    let n = lines.len();
    assert_eq!(lines[n - 2], "=== Summary OK=2 ERR=1 ===");
    assert!(lines[n - 1].starts_with("=== Scan finished at "));

    // Duplicate targets map to the same artifact
    assert_eq!(ws.html_files().len(), 1);
}

#[tokio::test]
async fn test_concurrent_workers_keep_tally_consistent() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/ok",
        ResponseTemplate::new(200)
            .set_body_string("ok")
            .set_delay(Duration::from_millis(50)),
    )
    .await;
    mount(&server, "/bad", ResponseTemplate::new(502)).await;

    let targets: Vec<Target> = (0..8)
        .map(|i| {
            let route = if i % 2 == 0 { "ok" } else { "bad" };
            Target::new(format!("{}/{}?n={}", server.uri(), route, i))
        })
        .collect();

    let ws = Workspace::new();
    let mut orchestrator = Orchestrator::new(
        direct_transport(),
        Some(FakeCapturer { shot: Shot::Succeed }),
        ws.layout.clone(),
        ws.open_log(),
    )
    .with_workers(4);
    let tally = orchestrator.run(&targets).await;
    orchestrator.finish(&tally);

    assert_eq!(tally, Tally { success: 4, failure: 4 });

    let lines = ws.log_lines();
    assert_eq!(tagged(&lines, "[OK]").len(), 4);
    assert_eq!(tagged(&lines, "[ERR]").len(), 4);
    assert_eq!(ws.html_files().len(), 4);
    assert_eq!(ws.png_files().len(), 4);
}

/// A "proxy" that accepts and hangs up: provisioning succeeds, every fetch fails
async fn hangup_proxy() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    addr
}

fn scan_config(dir: &Path, targets_content: &str, socks: &str) -> ScanConfig {
    let targets_path = dir.join("targets.yaml");
    std::fs::write(&targets_path, targets_content).unwrap();

    let mut config = ScanConfig::default();
    config.input.targets = targets_path;
    config.proxy.socks = socks.to_string();
    config.capture.enabled = false;
    config.output.dir = dir.join("output");
    config.output.log = dir.join("scan_report.log");
    config
}

#[tokio::test]
async fn test_only_comments_aborts_with_no_targets() {
    let dir = TempDir::new().unwrap();
    let config = scan_config(dir.path(), "# nothing\n\n# to scan\n", "127.0.0.1:9150");

    let result = run_scan(&config).await;
    let err = result.unwrap_err();
    assert!(matches!(err, ScanError::NoTargets));
    assert_eq!(err.exit_code(), 3);

    let content = std::fs::read_to_string(&config.output.log).unwrap();
    let lines: Vec<String> = content.lines().map(String::from).collect();
    assert_eq!(tagged(&lines, "[FATAL]").len(), 1);
    assert!(!config.output.dir.exists());
}

#[tokio::test]
async fn test_invalid_proxy_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = scan_config(dir.path(), "- http://a.onion/\n", "no-port-here");

    let err = run_scan(&config).await.unwrap_err();
    assert!(matches!(err, ScanError::ProxyConfigInvalid { .. }));
    assert_eq!(err.exit_code(), 4);

    let content = std::fs::read_to_string(&config.output.log).unwrap();
    let lines: Vec<String> = content.lines().map(String::from).collect();
    assert_eq!(tagged(&lines, "[FATAL]").len(), 1);
    assert!(tagged(&lines, "[INFO] Scanning:").is_empty());
}

#[tokio::test]
async fn test_full_run_through_broken_proxy() {
    let addr = hangup_proxy().await;

    let dir = TempDir::new().unwrap();
    let config = scan_config(
        dir.path(),
        "# list\n- http://first.onion/\nhttp://second.onion/\n",
        &addr.to_string(),
    );

    let tally = run_scan(&config).await.unwrap();
    assert_eq!(tally, Tally { success: 0, failure: 2 });

    let content = std::fs::read_to_string(&config.output.log).unwrap();
    let lines: Vec<String> = content.lines().map(String::from).collect();

    assert!(lines[0].starts_with("=== Scan started at "));
    assert_eq!(tagged(&lines, "[ERR]").len(), 2);
    assert!(tagged(&lines, "[FATAL]").is_empty());

    let n = lines.len();
    assert!(n >= 2 * 2 + 2);
    assert_eq!(lines[n - 2], "=== Summary OK=0 ERR=2 ===");
    assert!(lines[n - 1].starts_with("=== Scan finished at "));

    assert!(list_files(&config.output.dir.join("html")).is_empty());
}

#[tokio::test]
async fn test_browser_launch_failure_degrades_to_document_only() {
    let addr = hangup_proxy().await;

    let dir = TempDir::new().unwrap();
    let mut config = scan_config(dir.path(), "- http://only.onion/\n", &addr.to_string());
    config.capture.enabled = true;
    config.capture.chrome_path = Some(dir.path().join("nonexistent").join("chromium"));

    let tally = run_scan(&config).await.unwrap();
    assert_eq!(tally, Tally { success: 0, failure: 1 });

    let content = std::fs::read_to_string(&config.output.log).unwrap();
    let lines: Vec<String> = content.lines().map(String::from).collect();

    let warn = tagged(&lines, "[WARN]");
    assert_eq!(warn.len(), 1);
    assert!(warn[0].starts_with("[WARN] browser init failed"));
    assert!(tagged(&lines, "[FATAL]").is_empty());
    assert!(!content.contains("screenshots enabled"));

    assert_eq!(tagged(&lines, "[INFO] Scanning: http://only.onion/").len(), 1);
    assert_eq!(tagged(&lines, "[ERR] http://only.onion/").len(), 1);

    let n = lines.len();
    assert_eq!(lines[n - 2], "=== Summary OK=0 ERR=1 ===");
    assert!(lines[n - 1].starts_with("=== Scan finished at "));
    assert!(list_files(&config.output.dir.join("screenshots")).is_empty());
}
