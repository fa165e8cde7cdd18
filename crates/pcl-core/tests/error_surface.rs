use pcl_core::errors::{ErrorInfo, PclError, Warning};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("lmax", 1535)
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = PclError::Config(sample_info("lmax-mismatch", "lmax differs"));
    assert_eq!(err.info().code, "lmax-mismatch");
    assert_eq!(err.info().context.get("lmax").map(String::as_str), Some("1535"));
}

#[test]
fn numerical_error_surface() {
    let err = PclError::numerical("singular-coupling", "coupling matrix is singular");
    assert_eq!(err.info().code, "singular-coupling");
    assert!(err.to_string().starts_with("numerical error"));
}

#[test]
fn degenerate_error_surface() {
    let err = PclError::Degenerate(sample_info("empty-window", "window is zero"));
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn hint_is_rendered() {
    let err = PclError::Config(
        ErrorInfo::new("convention-mismatch", "Cl vs Dl").with_hint("rebuild the operator"),
    );
    assert!(err.to_string().contains("hint: rebuild the operator"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = PclError::Geometry(sample_info("pixelization-mismatch", "maps differ"));
    let json = serde_json::to_string(&err).unwrap();
    let back: PclError = serde_json::from_str(&json).unwrap();
    assert_eq!(err, back);
}

#[test]
fn warnings_keep_their_code() {
    let warning = Warning::emit("apodization-exceeds-region", "window is empty");
    assert_eq!(warning.code, "apodization-exceeds-region");
}
