use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, Paths};

pub fn run(data_dir: Option<&str>) -> Result<()> {
    let paths = Paths::resolve(data_dir);
    paths.ensure_dirs()?;

    let mut settings = load_settings();
    settings.data_dir = paths.data_dir.to_string_lossy().to_string();
    save_settings(&settings)?;

    let conn = get_connection(&paths.db_path)?;
    init_db(&conn)?;

    println!("{} {}", "Data directory:".bold(), paths.data_dir.display());
    println!("  raw files:       {}", paths.raw_dir.display());
    println!("  processed files: {}", paths.processed_dir.display());
    println!("  database:        {}", paths.db_path.display());
    Ok(())
}
