use std::env;
use std::path::PathBuf;

/// Get the global ElkLens data directory (~/.elklens/data)
fn get_global_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".elklens")
        .join("data")
}

/// Get the ElkLens database path
///
/// Priority:
/// 1. ELKLENS_DATABASE_PATH env var (absolute path override)
/// 2. Global: ~/.elklens/data/elklens.db
///
/// The CLI and the web server share this database, so a batch ingested by one
/// can be read back by the other.
pub fn get_database_path() -> PathBuf {
    if let Ok(db_path) = env::var("ELKLENS_DATABASE_PATH") {
        return PathBuf::from(db_path);
    }
    get_global_data_dir().join("elklens.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_env_override() {
        std::env::set_var("ELKLENS_DATABASE_PATH", "/custom/path/test.db");
        let db_path = get_database_path();
        assert_eq!(db_path, PathBuf::from("/custom/path/test.db"));
        std::env::remove_var("ELKLENS_DATABASE_PATH");
    }
}
