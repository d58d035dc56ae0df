use super::*;

#[test]
fn parse_reads_entries_and_skips_blanks() {
    let tokens = StaticTokens::parse(" alpha=1:ada , ,beta=42:grace hopper").expect("valid");
    assert_eq!(tokens.len(), 2);
}

#[test]
fn parse_empty_is_empty() {
    assert!(StaticTokens::parse("").expect("valid").is_empty());
}

#[test]
fn parse_rejects_malformed_entries() {
    for bad in ["alpha", "alpha=1", "alpha=x:ada", "=1:ada", "alpha=1:"] {
        let err = StaticTokens::parse(bad).expect_err(bad);
        assert!(matches!(err, AuthError::MalformedEntry(_)), "{bad}");
    }
}

#[tokio::test]
async fn verify_maps_token_to_identity() {
    let tokens = StaticTokens::parse("alpha=1:ada,beta=42:grace").expect("valid");
    let identity = tokens.verify("beta").await.expect("known");
    assert_eq!(identity, Identity { user_id: 42, username: "grace".into() });
}

#[tokio::test]
async fn verify_rejects_unknown_token() {
    let tokens = StaticTokens::default().with_token("alpha", 1, "ada");
    assert!(matches!(tokens.verify("nope").await, Err(AuthError::UnknownToken)));
}
