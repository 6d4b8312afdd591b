use chrono::Utc;
use polpo::config::TokenConfig;
use polpo::token::{TokenManager, decode_jwt_exp};

fn manager() -> TokenManager {
    TokenManager::new(&TokenConfig::default())
}

#[test]
fn token_within_margin_counts_as_expired() {
    let tokens = manager();
    let now = Utc::now().timestamp() as f64;

    // Default margin is 120s: one minute of remaining life is not enough
    tokens.set_token("tok", Some(now + 60.0));
    assert!(!tokens.is_valid());

    tokens.set_token("tok", Some(now + 600.0));
    assert!(tokens.is_valid());
}

#[test]
fn clear_removes_token_entirely() {
    let tokens = manager();
    tokens.set_token("tok", Some(Utc::now().timestamp() as f64 + 600.0));
    assert!(tokens.token().is_some());

    tokens.clear();
    assert!(tokens.token().is_none());
    assert!(!tokens.is_valid());
}

#[test]
fn invalidate_expiry_keeps_token_but_forces_refresh() {
    let tokens = manager();
    tokens.set_token("tok", Some(Utc::now().timestamp() as f64 + 600.0));

    tokens.invalidate_expiry();
    assert!(!tokens.is_valid());
    // The token itself survives for the next authenticated call
    assert_eq!(tokens.token().as_deref(), Some("tok"));
}

#[test]
fn opaque_token_falls_back_to_interval_expiry() {
    let tokens = manager();

    // Not a JWT, so expiry comes from the configured refresh interval
    tokens.set_token("not-a-jwt", None);
    assert!(tokens.is_valid());
}

#[test]
fn jwt_exp_claim_is_decoded() {
    // {"alg":"none"} . {"exp":4102444800} . empty signature
    let header = "eyJhbGciOiJub25lIn0";
    let claims = "eyJleHAiOjQxMDI0NDQ4MDB9";
    let token = format!("{header}.{claims}.");

    assert_eq!(decode_jwt_exp(&token), Some(4_102_444_800.0));
    assert_eq!(decode_jwt_exp("garbage"), None);

    let tokens = manager();
    tokens.set_token(&token, None);
    assert!(tokens.is_valid());
}
