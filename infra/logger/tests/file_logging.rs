use splus_logger::{LevelFilter, Logger};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn file_logging_writes_plain_access_lines() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let logger = Logger::builder()
        .name("integration-file-logging")
        .console(false)
        .path(&log_dir)
        .level(LevelFilter::INFO)
        .init()?;

    let span = tracing::info_span!(target: "splus::access", "access", request = %"10.0.0.1:5000 - \"GET /v1/ HTTP/1.1\"");
    tracing::info!(target: "splus::access", parent: &span, status = 429_u16, "response");

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("log file should be created");

    let contents = fs::read_to_string(&log_file)?;
    assert!(contents.contains("splus::access"), "target should be rendered: {contents}");
    assert!(contents.contains("10.0.0.1:5000 - \"GET /v1/ HTTP/1.1\" 429"), "request line should be rendered: {contents}");
    assert!(!contents.contains("request="), "span field name should be stripped: {contents}");
    assert!(!contents.contains('\x1b'), "file output must not contain escape codes");

    Ok(())
}
