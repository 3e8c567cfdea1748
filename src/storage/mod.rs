pub mod database;
pub mod models;
pub mod session_db;

pub use session_db::SessionDatabase;

use std::fs;
use std::path::Path;

/// Ensure data directory exists
pub fn ensure_data_dir(dir: &str) -> std::io::Result<()> {
    fs::create_dir_all(Path::new(dir))?;
    Ok(())
}
