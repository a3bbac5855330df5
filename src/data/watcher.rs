//! Static game data and its hot-reload watcher.
//!
//! Items, species and shop templates are loaded together and swapped as a
//! unit, so readers always see a consistent set.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use super::ItemRegistry;
use crate::pet::SpeciesRegistry;
use crate::shop::ShopRegistry;

/// Everything loaded from the data directory
#[derive(Debug, Clone, Default)]
pub struct GameData {
    pub items: ItemRegistry,
    pub species: SpeciesRegistry,
    pub shops: ShopRegistry,
}

pub type SharedGameData = Arc<RwLock<Arc<GameData>>>;

/// Events emitted by the hot-reload watcher
#[derive(Debug, Clone)]
pub enum DataReloadEvent {
    Reloaded(String),
    Error(String),
}

impl GameData {
    pub fn load(data_dir: &Path) -> Result<Self, String> {
        let mut items = ItemRegistry::new();
        items.load_from_directory(data_dir)?;

        let mut species = SpeciesRegistry::new();
        species.load_from_directory(data_dir)?;

        let mut shops = ShopRegistry::new();
        shops.load_from_directory(&data_dir.join("shops"))?;

        Ok(Self { items, species, shops })
    }
}

/// Reload the data directory and swap it in. The previous data stays live on failure.
pub async fn reload(shared: &SharedGameData, data_dir: &Path) -> Result<(), String> {
    let fresh = GameData::load(data_dir)?;
    *shared.write().await = Arc::new(fresh);
    Ok(())
}

/// Start file watcher for hot-reload.
/// Returns a channel receiver that signals when reloads occur.
pub fn start_file_watcher(
    shared: SharedGameData,
    data_dir: PathBuf,
) -> Result<tokio::sync::mpsc::Receiver<DataReloadEvent>, String> {
    use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
    use std::time::Duration;

    if !data_dir.exists() {
        return Err(format!("Data directory does not exist: {:?}", data_dir));
    }

    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let rt = tokio::runtime::Handle::try_current()
        .map_err(|e| format!("No tokio runtime for watcher: {}", e))?;

    // notify is sync, so the watcher lives on its own thread
    std::thread::spawn(move || {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = match RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        ) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to create file watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&data_dir, RecursiveMode::Recursive) {
            error!("Failed to watch data directory: {}", e);
            return;
        }

        info!("Data hot-reload watcher started for {:?}", data_dir);

        while let Ok(event) = notify_rx.recv() {
            use notify::EventKind;
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)) {
                continue;
            }

            let Some(path) = event.paths.iter().find(|p| {
                p.extension().and_then(|e| e.to_str()) == Some("toml")
            }) else {
                continue;
            };

            info!("Detected change in {:?}, triggering reload", path);

            let shared = Arc::clone(&shared);
            let tx = tx.clone();
            let data_dir = data_dir.clone();
            let path = path.to_string_lossy().to_string();

            rt.spawn(async move {
                match reload(&shared, &data_dir).await {
                    Ok(()) => {
                        let _ = tx.send(DataReloadEvent::Reloaded(path)).await;
                    }
                    Err(e) => {
                        error!("Hot-reload failed: {}", e);
                        let _ = tx.send(DataReloadEvent::Error(e)).await;
                    }
                }
            });
        }
    });

    Ok(rx)
}
