use hmc_log_forwarder::app::{LoggingError, SelfLogSettings, setup_self_logging};
use hmc_log_forwarder::destination::ConsoleStream;
use serial_test::serial;

fn settings(format: &str) -> SelfLogSettings {
    SelfLogSettings {
        dest: ConsoleStream::Stderr,
        format: format.to_string(),
        time_format: "iso8601".to_string(),
        debug: false,
    }
}

#[test]
#[serial]
fn test_invalid_format_does_not_install_subscriber() {
    let err = setup_self_logging(&settings("%(asctime)s %(funcName)s %(message)s")).unwrap_err();
    assert!(matches!(err, LoggingError::InvalidFormat(_)));

    let mut bad_time = settings("%(message)s");
    bad_time.time_format = "%Y-%".to_string();
    assert!(matches!(
        setup_self_logging(&bad_time),
        Err(LoggingError::InvalidFormat(_))
    ));
}

#[test]
#[serial]
fn test_self_logging_installs_once() {
    // The subscriber is process global; the second attempt must be refused.
    let first = setup_self_logging(&settings("%(asctime)s %(levelname)s %(name)s %(message)s"));
    assert!(first.is_ok() || matches!(first, Err(LoggingError::AlreadyInitialized)));

    tracing::info!("self-logging is set up");
    tokio_test::block_on(async {
        tracing::debug!("filtered out at info level");
    });

    assert!(matches!(
        setup_self_logging(&settings("%(message)s")),
        Err(LoggingError::AlreadyInitialized)
    ));
}
