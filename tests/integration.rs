use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn srag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("srag");
    path
}

/// Minimal one-page PDF. pdf-extract may or may not yield text from it;
/// ingestion must cope either way.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let content = b"BT /F1 12 Tf 100 700 Td (insurance float) Tj ET";
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let letters = root.join("letters");
    fs::create_dir_all(&letters).unwrap();
    fs::write(
        letters.join("2019ltr.txt"),
        "Insurance float grew again this year.\n\nGEICO continued to gain share.",
    )
    .unwrap();
    fs::write(
        letters.join("2020ltr.txt"),
        "BNSF carried fewer carloads.\n\nWe repurchased shares when they were cheap.",
    )
    .unwrap();
    fs::write(letters.join("2021ltr.pdf"), minimal_pdf_with_phrase()).unwrap();

    let config_content = format!(
        r#"[store]
path = "{root}/data/vector-store.json"

[chunking]
max_tokens = 250
overlap_tokens = 50

[server]
bind = "127.0.0.1:7341"

[corpus]
root = "{root}/letters"
include_globs = ["**/*.pdf", "**/*.txt"]
company = "Berkshire Hathaway"
document_type = "shareholder_letter"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("srag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// Write a snapshot directly so commands have something to report on.
fn write_snapshot(root: &Path) -> PathBuf {
    let path = root.join("data").join("vector-store.json");
    let snapshot = serde_json::json!([
        {
            "content": "Insurance float grew.",
            "metadata": { "source": "2019ltr.txt", "fileName": "2019ltr.txt", "year": 2019, "chunkIndex": 0 },
            "embedding": [1.0, 0.0, 0.0]
        },
        {
            "content": "BNSF carried fewer carloads.",
            "metadata": { "source": "2020ltr.txt", "fileName": "2020ltr.txt", "year": 2020, "chunkIndex": 0 },
            "embedding": [0.0, 1.0, 0.0]
        },
        {
            "content": "We repurchased shares.",
            "metadata": { "source": "2020ltr.txt", "fileName": "2020ltr.txt", "year": 2020, "chunkIndex": 1 },
            "embedding": [0.0, 0.0, 1.0]
        }
    ]);
    fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();
    path
}

fn run_srag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = srag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run srag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_ingest_dry_run_counts_files() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_srag(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest (dry-run)"));
    assert!(stdout.contains("files scanned: 3"), "got: {}", stdout);
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    run_srag(&config_path, &["ingest", "--dry-run"]);
    assert!(!tmp.path().join("data").join("vector-store.json").exists());
}

#[test]
fn test_ingest_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_srag(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_stats_empty_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_srag(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Records:     0"));
    assert!(stdout.contains("(no snapshot)"));
}

#[test]
fn test_stats_reports_snapshot() {
    let (tmp, config_path) = setup_test_env();
    write_snapshot(tmp.path());

    let (stdout, _, success) = run_srag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Records:     3"), "got: {}", stdout);
    assert!(stdout.contains("Dimensions:  3"));
    assert!(stdout.contains("Sources:     2"));
    assert!(stdout.contains("2020"));
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("data").join("vector-store.json"), "{ not json").unwrap();

    let (stdout, _, success) = run_srag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Records:     0"));
}

#[test]
fn test_clear_removes_snapshot() {
    let (tmp, config_path) = setup_test_env();
    let snapshot = write_snapshot(tmp.path());

    let (stdout, stderr, success) = run_srag(&config_path, &["clear"]);
    assert!(success, "clear failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("records removed: 3"));
    assert!(!snapshot.exists());

    // Idempotent
    let (stdout, _, success) = run_srag(&config_path, &["clear"]);
    assert!(success);
    assert!(stdout.contains("records removed: 0"));
}

#[test]
fn test_query_without_provider_fails() {
    let (tmp, config_path) = setup_test_env();
    write_snapshot(tmp.path());

    let (_, stderr, success) = run_srag(&config_path, &["query", "float"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_query_rejects_bad_filter() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_srag(&config_path, &["query", "float", "--filter", "no-equals"]);
    assert!(!success);
}

#[test]
fn test_missing_config_for_query() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_srag(&missing, &["query", "float"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_clear_with_invalid_config_keeps_snapshot() {
    let (tmp, config_path) = setup_test_env();
    let snapshot = write_snapshot(tmp.path());

    let bad = format!(
        "[store]\npath = \"{}\"\n\n[embedding]\nprovider = \"magic\"\n",
        snapshot.display()
    );
    fs::write(&config_path, bad).unwrap();

    let (_, stderr, success) = run_srag(&config_path, &["clear"]);
    assert!(!success, "clear should fail on an invalid config");
    assert!(stderr.contains("Unknown embedding provider"), "stderr: {}", stderr);
    assert!(snapshot.exists());

    let (_, _, success) = run_srag(&config_path, &["stats"]);
    assert!(!success);
}
