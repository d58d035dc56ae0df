use super::*;

const DELAY: Duration = Duration::from_millis(3_000);

#[test]
fn fixed_policy_schedules_one_attempt_at_delay() {
    let mut policy = ReconnectPolicy::fixed(DELAY);
    let t0 = Instant::now();

    assert_eq!(policy.on_unexpected_close(&CloseCause::Clean, t0), DELAY);
    assert_eq!(policy.deadline(), Some(t0 + DELAY));

    assert!(!policy.poll(t0 + Duration::from_millis(2_999)));
    assert!(policy.poll(t0 + DELAY));
    assert!(!policy.poll(t0 + DELAY), "attempt is claimed once");
    assert!(policy.deadline().is_none());
}

#[test]
fn clean_and_error_closes_schedule_identically() {
    let t0 = Instant::now();
    let mut clean = ReconnectPolicy::fixed(DELAY);
    let mut error = ReconnectPolicy::fixed(DELAY);

    clean.on_unexpected_close(&CloseCause::Clean, t0);
    error.on_unexpected_close(&CloseCause::Error("reset".into()), t0);
    assert_eq!(clean.deadline(), error.deadline());
}

#[test]
fn repeated_close_replaces_rather_than_stacks() {
    let mut policy = ReconnectPolicy::fixed(DELAY);
    let t0 = Instant::now();

    policy.on_unexpected_close(&CloseCause::Clean, t0);
    policy.on_unexpected_close(&CloseCause::Clean, t0 + Duration::from_secs(1));

    assert_eq!(policy.deadline(), Some(t0 + Duration::from_secs(1) + DELAY));
    assert_eq!(policy.attempts(), 2);
}

#[test]
fn cancel_clears_pending_attempt() {
    let mut policy = ReconnectPolicy::fixed(DELAY);
    let t0 = Instant::now();
    policy.on_unexpected_close(&CloseCause::Clean, t0);

    policy.cancel();
    assert!(!policy.poll(t0 + DELAY * 10));
}

#[test]
fn open_resets_attempts_and_pending() {
    let mut policy = ReconnectPolicy::fixed(DELAY);
    let t0 = Instant::now();
    policy.on_unexpected_close(&CloseCause::Error("refused".into()), t0);

    policy.on_open();
    assert_eq!(policy.attempts(), 0);
    assert!(policy.deadline().is_none());
}

#[test]
fn exponential_backoff_doubles_to_cap_and_resets() {
    let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
    let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);

    backoff.reset();
    assert_eq!(backoff.next_delay(), Duration::from_secs(1));
}

#[test]
fn policy_uses_strategy_spacing() {
    let strategy = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(2));
    let mut policy = ReconnectPolicy::new(Box::new(strategy));
    let t0 = Instant::now();

    assert_eq!(policy.on_unexpected_close(&CloseCause::Clean, t0), Duration::from_millis(500));
    assert_eq!(policy.on_unexpected_close(&CloseCause::Clean, t0), Duration::from_secs(1));
    policy.on_open();
    assert_eq!(policy.on_unexpected_close(&CloseCause::Clean, t0), Duration::from_millis(500));
}

#[test]
fn unbounded_backoff_saturates_without_overflow() {
    let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::MAX);
    let mut last = Duration::ZERO;
    for _ in 0..200 {
        let delay = backoff.next_delay();
        assert!(delay >= last);
        last = delay;
    }
    assert_eq!(last, Duration::MAX);
}

#[test]
fn huge_delay_schedules_far_deadline() {
    let mut policy = ReconnectPolicy::fixed(Duration::MAX);
    let t0 = Instant::now();

    policy.on_unexpected_close(&CloseCause::Clean, t0);
    let at = policy.deadline().expect("scheduled");
    assert!(at > t0 + Duration::from_secs(86_400));
    assert!(!policy.poll(t0 + Duration::from_secs(86_400)));
}
