use super::*;

#[test]
fn deadline_after_adds_ordinary_delays() {
    let now = Instant::now();
    assert_eq!(deadline_after(now, Duration::from_millis(100)), now + Duration::from_millis(100));
}

#[test]
fn deadline_after_saturates_instead_of_panicking() {
    let now = Instant::now();
    let at = deadline_after(now, Duration::MAX);
    assert!(at > now);
    assert!(at >= now + Duration::from_secs(86_400 * 365));
}

#[tokio::test(start_paused = true)]
async fn wait_deadline_without_deadline_never_completes() {
    let waited = tokio::time::timeout(Duration::from_secs(3_600), wait_deadline(None)).await;
    assert!(waited.is_err());
}

#[tokio::test(start_paused = true)]
async fn wait_deadline_completes_at_deadline() {
    let start = Instant::now();
    wait_deadline(Some(start + Duration::from_millis(250))).await;
    assert!(Instant::now() >= start + Duration::from_millis(250));
}
