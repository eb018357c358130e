//! Environment overrides for `ClientConfig`.
//!
//! Kept in its own test binary: it mutates process environment variables
//! that every `ClientConfig::load` call reads.

use std::io::Write;
use std::time::Duration;

use wsupgrade::ClientConfig;

const TIMEOUT_VAR: &str = "WSUPGRADE__HANDSHAKE_TIMEOUT_MS";
const HEADER_VAR: &str = "WSUPGRADE__DEFAULT_HEADERS__X_CLIENT";

#[test]
fn environment_overrides_defaults_and_file() {
    // SAFETY: this binary runs no other test that touches the environment
    unsafe {
        std::env::set_var(TIMEOUT_VAR, "1234");
        std::env::set_var(HEADER_VAR, "from-env");
    }

    let config = ClientConfig::load(None).unwrap();
    assert_eq!(config.handshake_timeout_ms, 1234);
    assert_eq!(
        config.headers().unwrap().header("x_client"),
        Some("from-env")
    );

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
handshake_timeout_ms = 2500
user_agent = "wsupgrade-test/1.0"

[default_headers]
x_client = "from-file"
"#
    )
    .unwrap();

    let config = ClientConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.handshake_timeout(), Duration::from_millis(1234));
    let headers = config.headers().unwrap();
    assert_eq!(headers.header("x_client"), Some("from-env"));
    assert_eq!(headers.header("user-agent"), Some("wsupgrade-test/1.0"));

    // SAFETY: cleaning up the variables set above
    unsafe {
        std::env::remove_var(TIMEOUT_VAR);
        std::env::remove_var(HEADER_VAR);
    }

    let config = ClientConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.handshake_timeout_ms, 2500);
}
