use std::sync::Arc;

use crate::{
    cache::{ListingCache, SWEEP_INTERVAL},
    config::Config,
    database::{Db, init_mongo},
    models::Order,
    queue::WorkQueue,
};

pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub cache: ListingCache,
    pub orders: WorkQueue<Order>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let db = init_mongo(&config).await.expect("Database unreachable!");

        let cache = ListingCache::new();
        // Detach the sweeper; it lives as long as the process.
        let _ = cache.spawn_sweeper(SWEEP_INTERVAL);

        let orders = WorkQueue::new(config.order_concurrency);

        Arc::new(Self {
            config,
            db,
            cache,
            orders,
        })
    }
}
