//! Configuration loading from environment variables

use keygate_auth::config::{ConfigError, KeycloakConfig};
use std::collections::HashMap;

fn base_env() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("KEYCLOAK_SERVER_URL", "https://sso.example.com/"),
        ("KEYCLOAK_REALM", "acme"),
        ("CLIENT_ID", "keygate"),
        ("CLIENT_SECRET", "s3cr3t"),
    ])
}

fn load(env: &HashMap<&'static str, &'static str>) -> Result<KeycloakConfig, ConfigError> {
    KeycloakConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()))
}

#[test]
fn test_required_variables_are_reported_by_name() {
    for var in [
        "KEYCLOAK_SERVER_URL",
        "KEYCLOAK_REALM",
        "CLIENT_ID",
        "CLIENT_SECRET",
    ] {
        let mut env = base_env();
        env.remove(var);
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(var));
    }
}

#[test]
fn test_blank_value_counts_as_missing() {
    let mut env = base_env();
    env.insert("CLIENT_SECRET", "   ");
    assert_eq!(
        load(&env).unwrap_err(),
        ConfigError::Missing("CLIENT_SECRET")
    );
}

#[test]
fn test_defaults() {
    let config = load(&base_env()).expect("valid config");
    assert_eq!(config.issuer(), "https://sso.example.com/realms/acme");
    assert_eq!(config.valid_issuers, vec![config.issuer()]);
    assert_eq!(config.session_lifetime, chrono::Duration::minutes(50));
    assert_eq!(config.provider_timeout, std::time::Duration::from_secs(10));
    assert_eq!(config.public_url.as_str(), "http://localhost:3000/");
    assert_eq!(config.scopes, vec!["openid", "profile", "email"]);
    assert!(!config.secure_cookies);
    assert_eq!(config.signing_secret.len(), 32);
}

#[test]
fn test_realm_endpoints() {
    let config = load(&base_env()).expect("valid config");
    assert_eq!(
        config.authorization_endpoint(),
        "https://sso.example.com/realms/acme/protocol/openid-connect/auth"
    );
    assert_eq!(
        config.token_endpoint(),
        "https://sso.example.com/realms/acme/protocol/openid-connect/token"
    );
}

#[test]
fn test_client_registration_redirect_uris() {
    let mut env = base_env();
    env.insert("PUBLIC_URL", "https://api.example.com/");
    let registration = load(&env).expect("valid config").client_registration();
    assert_eq!(registration.issuer, "https://sso.example.com/realms/acme");
    assert_eq!(
        registration.login_redirect_uri,
        "https://api.example.com/callback/login/keycloak"
    );
    assert_eq!(
        registration.logout_redirect_uri,
        "https://api.example.com/callback/logout/keycloak"
    );
    assert!(!format!("{registration:?}").contains("s3cr3t"));
}

#[test]
fn test_invalid_server_url() {
    let mut env = base_env();
    env.insert("KEYCLOAK_SERVER_URL", "not a url");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "KEYCLOAK_SERVER_URL",
            ..
        })
    ));

    env.insert("KEYCLOAK_SERVER_URL", "ftp://sso.example.com");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "KEYCLOAK_SERVER_URL",
            ..
        })
    ));
}

#[test]
fn test_realm_with_slash_is_rejected() {
    let mut env = base_env();
    env.insert("KEYCLOAK_REALM", "acme/evil");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "KEYCLOAK_REALM",
            ..
        })
    ));
}

#[test]
fn test_valid_issuers_list() {
    let mut env = base_env();
    env.insert(
        "VALID_ISSUERS",
        "https://sso.example.com/realms/acme/, https://other.example.com/realms/x ,",
    );
    let config = load(&env).expect("valid config");
    assert_eq!(
        config.valid_issuers,
        vec![
            "https://sso.example.com/realms/acme",
            "https://other.example.com/realms/x"
        ]
    );

    env.insert("VALID_ISSUERS", " , ");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "VALID_ISSUERS",
            ..
        })
    ));
}

#[test]
fn test_numeric_settings_must_be_positive() {
    let mut env = base_env();
    env.insert("SESSION_LIFETIME_MINUTES", "0");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "SESSION_LIFETIME_MINUTES",
            ..
        })
    ));

    let mut env = base_env();
    env.insert("PROVIDER_TIMEOUT_SECS", "soon");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "PROVIDER_TIMEOUT_SECS",
            ..
        })
    ));

    let mut env = base_env();
    env.insert("SESSION_LIFETIME_MINUTES", "5");
    env.insert("PROVIDER_TIMEOUT_SECS", "2");
    let config = load(&env).expect("valid config");
    assert_eq!(config.session_lifetime, chrono::Duration::minutes(5));
    assert_eq!(config.provider_timeout, std::time::Duration::from_secs(2));
}

#[test]
fn test_session_secret() {
    let mut env = base_env();
    env.insert("SESSION_SECRET", "too-short");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "SESSION_SECRET",
            ..
        })
    ));

    env.insert("SESSION_SECRET", "0123456789abcdef0123456789abcdef");
    let config = load(&env).expect("valid config");
    assert_eq!(
        config.signing_secret,
        b"0123456789abcdef0123456789abcdef".to_vec()
    );
    assert!(!format!("{config:?}").contains("0123456789abcdef"));
}

#[test]
fn test_secure_cookies_and_scopes() {
    let mut env = base_env();
    env.insert("SECURE_COOKIES", "true");
    env.insert("OIDC_SCOPES", "openid roles");
    let config = load(&env).expect("valid config");
    assert!(config.secure_cookies);
    assert_eq!(config.scopes, vec!["openid", "roles"]);

    env.insert("SECURE_COOKIES", "maybe");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "SECURE_COOKIES",
            ..
        })
    ));
}

#[test]
fn test_cookie_domain() {
    let mut env = base_env();
    assert_eq!(load(&env).expect("valid config").cookie_domain, None);

    env.insert("COOKIE_DOMAIN", "example.com");
    let config = load(&env).expect("valid config");
    assert_eq!(config.cookie_domain.as_deref(), Some("example.com"));

    env.insert("COOKIE_DOMAIN", "example.com; Secure");
    assert!(matches!(
        load(&env),
        Err(ConfigError::Invalid {
            var: "COOKIE_DOMAIN",
            ..
        })
    ));
}
