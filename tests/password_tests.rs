//! 密码哈希功能单元测试
//!
//! 测试 Argon2id 密码哈希、验证和密码策略

use account_auth::auth::password::PasswordHasher;
use account_auth::config::SecurityConfig;

mod common;
use common::create_test_config;

fn security() -> SecurityConfig {
    create_test_config().security
}

#[test]
fn test_hash_and_verify() {
    let hasher = PasswordHasher::new(&security()).unwrap();

    let hash = hasher.hash("CorrectHorse1").unwrap();
    assert!(hash.starts_with("$argon2id$v=19$m=8192,t=2,p=1$"));

    assert!(hasher.verify("CorrectHorse1", &hash).unwrap());
    assert!(!hasher.verify("correcthorse1", &hash).unwrap());
}

#[test]
fn test_same_password_different_salts() {
    let hasher = PasswordHasher::new(&security()).unwrap();

    let a = hasher.hash("CorrectHorse1").unwrap();
    let b = hasher.hash("CorrectHorse1").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_hash_from_other_cost_still_verifies() {
    let mut stronger = security();
    stronger.password_hash_memory_kib = 16384;
    stronger.password_hash_iterations = 3;

    let old = PasswordHasher::new(&stronger).unwrap();
    let hash = old.hash("CorrectHorse1").unwrap();

    // 参数编码在哈希串中，调整成本后旧哈希仍可验证
    let current = PasswordHasher::new(&security()).unwrap();
    assert!(current.verify("CorrectHorse1", &hash).unwrap());
}

#[test]
fn test_malformed_hash_is_an_error() {
    let hasher = PasswordHasher::new(&security()).unwrap();

    let err = hasher.verify("CorrectHorse1", "not-a-phc-string").unwrap_err();
    assert!(err.is_infrastructure());
}

#[test]
fn test_dummy_verify_never_matches() {
    let hasher = PasswordHasher::new(&security()).unwrap();

    assert!(!hasher.verify_dummy("decoy-password-never-matches").unwrap());
    assert!(!hasher.verify_dummy("CorrectHorse1").unwrap());
}

#[test]
fn test_password_policy() {
    let policy = security();

    assert!(PasswordHasher::validate_password_policy("Password123", &policy).is_ok());
    assert!(PasswordHasher::validate_password_policy("Pass1", &policy).is_err());
    assert!(PasswordHasher::validate_password_policy("password123", &policy).is_err());
    assert!(PasswordHasher::validate_password_policy("PasswordABC", &policy).is_err());

    let mut strict = policy.clone();
    strict.password_require_special = true;
    assert!(PasswordHasher::validate_password_policy("Password123", &strict).is_err());
    assert!(PasswordHasher::validate_password_policy("Password123!", &strict).is_ok());
}

#[test]
fn test_invalid_cost_is_config_error() {
    let mut bad = security();
    bad.password_hash_parallelism = 0;

    assert!(PasswordHasher::new(&bad).is_err());
}
