use std::sync::Arc;

use dotenv::dotenv;

use vectura::config::{Config, Mode};
use vectura::simulation::Simulation;
use vectura::store::FileStore;
use vectura::sync::{timer, Observer, SyncBus};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().unwrap();

    match config.mode {
        Mode::Daemon => {
            let bus = SyncBus::new(64);
            let store = Arc::new(FileStore::new(config.state_path.clone()));

            let mut scheduler = Observer::new("scheduler", bus, store);
            scheduler.hydrate().await.unwrap();

            tracing::info!(path = %config.state_path, "dispatch daemon running");

            timer::run(scheduler, config.tick_interval).await.unwrap();
        }
        Mode::Simulate => {
            let report = Simulation::new(5, 12).run().await.unwrap();

            tracing::info!(?report, "simulation report");
        }
    }
}
