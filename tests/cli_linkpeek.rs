use std::path::Path;
use std::time::Duration;

use predicates::prelude::*;

static PIXEL_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

const PAGE_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Home</title></head>
  <body>
    <nav>
      <a href="https://b.test/page">B page</a>
      <a href="https://c.test/never">Never visited</a>
      <a href="https://a.test/page?utm_source=nav#top" title="A page">A</a>
      <a href="https://a.test/page">A again</a>
      <a href="https://hidden.test/page" style="display: none">Hidden</a>
    </nav>
  </body>
</html>
"#;

fn linkpeek(store: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("linkpeek");
    cmd.env_remove("LINKPEEK_STORE")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(store);
    cmd
}

fn visit(store: &Path, page_url: &str, href: &str) -> String {
    let output = linkpeek(store)
        .args(["visit", "--page-url", page_url, "--href", href])
        .output()
        .expect("run visit");
    assert!(output.status.success(), "visit failed: {output:?}");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn analyze(store: &Path, html: &Path, extra: &[&str]) -> serde_json::Value {
    let output = linkpeek(store)
        .args(["analyze", "--page-url", "https://home.test/"])
        .arg("--html")
        .arg(html)
        .args(extra)
        .output()
        .expect("run analyze");
    assert!(output.status.success(), "analyze failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("analyze prints json")
}

fn link_urls(report: &serde_json::Value) -> Vec<String> {
    report["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["url"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let store = tempfile::tempdir().unwrap();
    linkpeek(store.path())
        .env("RUST_LOG", "debug")
        .args(["settings", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}

#[test]
fn settings_show_persists_defaults() {
    let store = tempfile::tempdir().unwrap();
    linkpeek(store.path())
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""maxPreloadPerPage": 3"#))
        .stdout(predicate::str::contains(r#""displayLimit": 5"#))
        .stdout(predicate::str::contains("youtube.com"));

    assert!(store.path().join("local_settings.json").exists());
}

#[test]
fn settings_edits_are_persisted() {
    let store = tempfile::tempdir().unwrap();
    for _ in 0..2 {
        linkpeek(store.path())
            .args(["settings", "blacklist-add", "*.ads.test"])
            .assert()
            .success();
    }
    linkpeek(store.path())
        .args(["settings", "max-preload", "7"])
        .assert()
        .success();

    let output = linkpeek(store.path())
        .args(["settings", "show"])
        .output()
        .unwrap();
    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["blacklist"], serde_json::json!(["*.ads.test"]));
    assert_eq!(settings["maxPreloadPerPage"], 7);

    linkpeek(store.path())
        .args(["settings", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""blacklist": []"#));
}

#[test]
fn max_preload_out_of_range_is_rejected() {
    let store = tempfile::tempdir().unwrap();
    linkpeek(store.path())
        .args(["settings", "max-preload", "11"])
        .assert()
        .failure();
}

#[test]
fn visit_resolves_and_normalizes_href() {
    let store = tempfile::tempdir().unwrap();
    assert_eq!(
        visit(store.path(), "https://home.test/docs/", "guide?utm_campaign=x#intro"),
        "https://home.test/docs/guide"
    );
    assert_eq!(visit(store.path(), "https://home.test/", "mailto:me@home.test"), "skipped");
    assert_eq!(visit(store.path(), "https://home.test/", "/report.pdf"), "skipped");
    assert_eq!(
        visit(store.path(), "https://www.youtube.com/", "/watch?v=1"),
        "skipped"
    );

    let visits = std::fs::read_to_string(store.path().join("local_visits.json")).unwrap();
    let visits: serde_json::Value = serde_json::from_str(&visits).unwrap();
    assert_eq!(
        visits["visitCountsByUrl"]["https://home.test/docs/guide"]["count"],
        1
    );
}

#[test]
fn analyze_ranks_visited_links_and_preloads_them() {
    let store = tempfile::tempdir().unwrap();
    let html = store.path().join("page.html");
    std::fs::write(&html, PAGE_HTML).unwrap();

    for _ in 0..3 {
        visit(store.path(), "https://home.test/", "https://a.test/page");
    }
    visit(store.path(), "https://home.test/", "https://b.test/page");
    visit(store.path(), "https://home.test/", "https://hidden.test/page");

    let report = analyze(store.path(), &html, &[]);
    assert_eq!(report["disabled"], false);
    assert_eq!(
        link_urls(&report),
        vec!["https://a.test/page", "https://b.test/page"]
    );
    assert_eq!(report["links"][0]["title"], "A page");
    assert_eq!(report["links"][0]["visitCount"], 3);
    assert_eq!(
        report["preloaded"],
        serde_json::json!(["https://a.test/page", "https://b.test/page"])
    );

    let overlay = report["overlay_html"].as_str().unwrap();
    assert!(overlay.contains(r#"<style id="linkpeek-styles">"#));
    assert!(overlay.contains(r#"id="linkpeek-container""#));
    assert!(overlay.contains("linear-gradient"));

    let head = report["head_html"].as_str().unwrap();
    assert!(head.contains(r#"<link rel="prefetch" href="https://a.test/page" as="document">"#));

    let report = analyze(store.path(), &html, &["--speculation-rules"]);
    let head = report["head_html"].as_str().unwrap();
    assert!(head.contains(r#"<script type="speculationrules">"#));
    assert!(!head.contains("prefetch"));
}

#[test]
fn analyze_without_history_renders_nothing() {
    let store = tempfile::tempdir().unwrap();
    let html = store.path().join("page.html");
    std::fs::write(&html, PAGE_HTML).unwrap();

    let report = analyze(store.path(), &html, &[]);
    assert_eq!(report["links"], serde_json::json!([]));
    assert_eq!(report["overlay_html"], "");
    assert_eq!(report["head_html"], "");
}

#[test]
fn analyze_respects_blacklist_and_disabled_domains() {
    let store = tempfile::tempdir().unwrap();
    let html = store.path().join("page.html");
    std::fs::write(&html, PAGE_HTML).unwrap();
    visit(store.path(), "https://home.test/", "https://a.test/page");
    visit(store.path(), "https://home.test/", "https://b.test/page");

    linkpeek(store.path())
        .args(["settings", "blacklist-add", "a.test"])
        .assert()
        .success();
    let report = analyze(store.path(), &html, &[]);
    assert_eq!(link_urls(&report), vec!["https://b.test/page"]);

    linkpeek(store.path())
        .args(["settings", "disable-domain", "*.home.test"])
        .assert()
        .success();
    let report = analyze(store.path(), &html, &[]);
    assert_eq!(report["disabled"], true);
    assert_eq!(report["links"], serde_json::json!([]));
}

#[test]
fn screenshot_is_used_as_card_background() {
    let store = tempfile::tempdir().unwrap();
    let image = store.path().join("shot.png");
    std::fs::write(&image, PIXEL_PNG).unwrap();
    let html = store.path().join("page.html");
    std::fs::write(&html, PAGE_HTML).unwrap();

    linkpeek(store.path())
        .args(["screenshot", "--url", "https://a.test/page?utm_source=x", "--settle-ms", "0"])
        .arg("--image")
        .arg(&image)
        .assert()
        .success()
        .stdout("https://a.test/page\n");

    visit(store.path(), "https://home.test/", "https://a.test/page");
    let report = analyze(store.path(), &html, &[]);
    let screenshot = report["links"][0]["screenshot"].as_str().unwrap();
    assert!(screenshot.starts_with("data:image/png;base64,"));
    assert!(report["overlay_html"].as_str().unwrap().contains("background-image"));
}

#[test]
fn screenshot_with_missing_image_fails() {
    let store = tempfile::tempdir().unwrap();
    linkpeek(store.path())
        .args([
            "screenshot",
            "--url",
            "https://a.test/page",
            "--image",
            "/nonexistent/shot.png",
            "--settle-ms",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("screenshot not captured"));
}

#[test]
fn prune_drops_old_records() {
    let store = tempfile::tempdir().unwrap();
    visit(store.path(), "https://home.test/", "https://a.test/page");

    linkpeek(store.path())
        .args(["prune"])
        .assert()
        .success()
        .stdout("pruned 0 visits, 0 screenshots\n");

    std::thread::sleep(Duration::from_millis(20));
    linkpeek(store.path())
        .args(["prune", "--max-age-days", "0"])
        .assert()
        .success()
        .stdout("pruned 1 visits, 0 screenshots\n");
}

#[test]
fn store_can_come_from_env() {
    let store = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("linkpeek");
    cmd.env("LINKPEEK_STORE", store.path())
        .args(["settings", "show"])
        .assert()
        .success();
    assert!(store.path().join("local_settings.json").exists());
}
