use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "CareTrack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory (~/CareTrack/)
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CARETRACK_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("CareTrack")
}

/// Path of the SQLite database file
pub fn db_path() -> PathBuf {
    app_data_dir().join("caretrack.db")
}

/// Listen address, overridable via CARETRACK_ADDR
pub fn bind_addr() -> SocketAddr {
    std::env::var("CARETRACK_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

/// Optional "username:password" bootstrap credentials for the initial
/// master admin account.
pub fn bootstrap_admin() -> Option<(String, String)> {
    let raw = std::env::var("CARETRACK_BOOTSTRAP_ADMIN").ok()?;
    let (user, password) = raw.split_once(':')?;
    if user.is_empty() || password.is_empty() {
        return None;
    }
    Some((user.to_string(), password.to_string()))
}

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> String {
    "caretrack=info,tower_http=warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_under_data_dir() {
        let db = db_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("caretrack.db"));
    }

    #[test]
    fn default_bind_addr_is_loopback() {
        if std::env::var("CARETRACK_ADDR").is_err() {
            assert!(bind_addr().ip().is_loopback());
        }
    }

    #[test]
    fn app_name_is_caretrack() {
        assert_eq!(APP_NAME, "CareTrack");
    }
}
