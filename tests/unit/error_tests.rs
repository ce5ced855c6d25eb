//! Unit tests for `AppError` display format and conversions.

use agent_bridge::AppError;

#[test]
fn every_variant_has_a_distinct_prefix() {
    let errors = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Io("x".into()), "io: x"),
        (AppError::Http("x".into()), "http: x"),
        (AppError::Json("x".into()), "json: x"),
        (AppError::Protocol("x".into()), "protocol: x"),
        (AppError::Encode("x".into()), "encode: x"),
        (AppError::Discovery("x".into()), "discovery: x"),
        (AppError::Tool("x".into()), "tool: x"),
    ];

    for (err, expected) in errors {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_errors_convert_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io);

    assert!(matches!(err, AppError::Io(_)));
    assert_eq!(err.to_string(), "io: pipe closed");
}

#[test]
fn error_message_has_no_trailing_period() {
    let err = AppError::Protocol("second message on a request connection".into());
    let s = err.to_string();
    assert!(!s.ends_with('.'), "error message must not end with a period: {s}");
}

#[test]
fn app_error_is_a_std_error() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
    assert_error(&AppError::Http("bad start line".into()));
}
