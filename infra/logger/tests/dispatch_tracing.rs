use eventree::{EventArgs, Registry};
use eventree_logger::{LevelFilter, Logger};
use std::fs;

#[test]
fn dispatch_rounds_reach_the_log_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let logger = Logger::builder()
        .name("integration-dispatch")
        .console(false)
        .level(LevelFilter::WARN)
        .dispatch_tracing(true)
        .path(&log_dir)
        .init()?;
    assert!(logger.has_file_output());

    let registry = Registry::new();
    let emitter = registry.get_or_create("traced.orders")?;
    emitter.on("placed", |_| Ok(()))?;
    emitter.emit("placed", EventArgs::new())?;
    tracing::info!("below the default level");

    // Dropping the handle flushes the background writer.
    drop(logger);

    let contents: String = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .map(fs::read_to_string)
        .collect::<Result<_, _>>()?;

    assert!(contents.contains("Dispatching round"), "missing dispatch trace:\n{contents}");
    assert!(contents.contains("traced.orders"), "missing emitter name:\n{contents}");
    assert!(!contents.contains("below the default level"));
    Ok(())
}
