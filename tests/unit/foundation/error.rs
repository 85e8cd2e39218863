use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CollageError::not_found("x")
            .to_string()
            .contains("not found:")
    );
    assert!(CollageError::state("x").to_string().contains("state error:"));
    assert!(
        CollageError::geometry("x")
            .to_string()
            .contains("geometry error:")
    );
    assert!(
        CollageError::decode("x")
            .to_string()
            .contains("decode error:")
    );
    assert!(
        CollageError::ownership("x")
            .to_string()
            .contains("ownership error:")
    );
    assert!(
        CollageError::UnsupportedForGroup(LayerId(7))
            .to_string()
            .contains("layer#7")
    );
}

#[test]
fn kinds_match_variants() {
    assert_eq!(CollageError::geometry("x").kind(), ErrorKind::Geometry);
    assert_eq!(CollageError::Cancelled.kind(), ErrorKind::Cancelled);
    assert!(CollageError::decode("x").is_leaf_local());
    assert!(CollageError::geometry("x").is_leaf_local());
    assert!(!CollageError::not_found("x").is_leaf_local());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CollageError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[test]
fn json_errors_become_serde() {
    let err: CollageError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::Serde);
}
