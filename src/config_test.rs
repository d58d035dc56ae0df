use super::*;

/// # Safety
/// Only this test touches `PORT` and `VIEWSYNC_*` relay variables.
unsafe fn clear_relay_env() {
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("VIEWSYNC_TOKENS");
        std::env::remove_var("VIEWSYNC_CLIENT_QUEUE");
    }
}

#[test]
fn from_env_defaults_and_overrides() {
    unsafe { clear_relay_env() };
    let cfg = RelayConfig::from_env();
    assert_eq!(cfg, RelayConfig { port: DEFAULT_PORT, tokens: String::new(), client_queue: DEFAULT_CLIENT_QUEUE });

    unsafe {
        std::env::set_var("PORT", "8080");
        std::env::set_var("VIEWSYNC_TOKENS", "t=1:ada");
        std::env::set_var("VIEWSYNC_CLIENT_QUEUE", "0");
    }
    let cfg = RelayConfig::from_env();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.tokens, "t=1:ada");
    assert_eq!(cfg.client_queue, 1);

    unsafe {
        std::env::set_var("PORT", "not-a-port");
    }
    assert_eq!(RelayConfig::from_env().port, DEFAULT_PORT);

    unsafe { clear_relay_env() };
}
