mod config;

use config::{config_path_from_env, load_or_create_config, resolve_directories, resolve_path};
use melodex_core::db::library::get_library_stats;
use melodex_core::{Database, LibraryScanner, LibrarySettings, LoftyReader, ScanObserver, ScanStage};
use tracing::{debug, info, warn};

/// Reports scan progress through the log.
struct LogObserver;

impl ScanObserver for LogObserver {
    fn stage_changed(&self, stage: ScanStage) {
        info!("scan stage: {stage}");
    }

    fn found_files_changed(&self, found: usize) {
        debug!("files to extract: {found}");
    }

    fn extracted_files_changed(&self, extracted: usize) {
        debug!("files extracted: {extracted}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("created default config at {:?}", config_path);
        info!("add library directories to it and run again");
        return Ok(());
    }
    info!("loaded config from {:?}", config_path);

    if config.library_directories.is_empty() {
        warn!("no library directories configured in {:?}", config_path);
        return Ok(());
    }

    let database_path = resolve_path(&config_path, &config.database_path);
    let media_art_directory = resolve_path(&config_path, &config.media_art_directory);
    let settings = LibrarySettings {
        library_directories: resolve_directories(&config_path, &config.library_directories),
        blacklisted_directories: resolve_directories(&config_path, &config.blacklisted_directories),
    };

    let db = Database::new(&database_path)?;
    let reader = LoftyReader;
    let observer = LogObserver;
    let scanner = LibraryScanner::new(&db, settings, media_art_directory, &reader, &observer);
    let stats = scanner.run()?;

    if stats.cancelled {
        info!("scan cancelled");
    }
    info!(
        "scan finished: {} found, {} extracted, {} removed",
        stats.found, stats.extracted, stats.removed
    );

    let conn = db.conn()?;
    let library = get_library_stats(&conn)?;
    info!(
        "library: {} tracks, {} artists, {} albums, {} genres, {:.0}s of audio",
        library.tracks, library.artists, library.albums, library.genres, library.total_duration
    );

    Ok(())
}
