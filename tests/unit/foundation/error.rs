use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MontageError::invalid_geometry("x")
            .to_string()
            .contains("invalid media geometry:")
    );
    assert!(
        MontageError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        MontageError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert_eq!(
        MontageError::EmptyComposition.to_string(),
        "composition has no segments"
    );
}

#[test]
fn export_failed_names_output_and_reason() {
    let err = MontageError::export_failed("/tmp/mergedVideo.mp4", "encoder crashed");
    let msg = err.to_string();
    assert!(msg.contains("/tmp/mergedVideo.mp4"));
    assert!(msg.contains("encoder crashed"));
}

#[test]
fn unreadable_source_names_item_and_reason() {
    let err = MontageError::unreadable(3, "no video track");
    assert!(matches!(err, MontageError::UnreadableSource { index: 3, .. }));
    let msg = err.to_string();
    assert!(msg.contains('3'));
    assert!(msg.contains("no video track"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MontageError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
