use splus_logger::{ColourMode, LevelFilter, Logger, Palette};

#[test]
fn init_console_only_has_no_guard() {
    let logger = Logger::builder()
        .name("integration-console-only")
        .console(true)
        .colour(ColourMode::Never)
        .level(LevelFilter::INFO)
        .init()
        .expect("logger should initialize");

    assert!(logger.guard().is_none(), "console-only logger should not create a file guard");
    assert_eq!(logger.palette(), Palette::Plain);

    tracing::info!(target: "splus::access", status = 200_u16, "127.0.0.1:5000 - \"GET / HTTP/1.1\" ");
}
