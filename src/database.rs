//! # MongoDB
//!
//! Document database holding users, canteens, menu items, orders and
//! feedback. Startup pings the configured deployment with a short server
//! selection timeout and falls back to the local instance when the primary
//! URL is unreachable, so a dev machine without the full stack still boots.

use std::time::Duration;

use mongodb::{
    Client, Collection, IndexModel,
    bson::doc,
    options::{ClientOptions, IndexOptions},
};
use tracing::{info, warn};

use crate::{
    config::Config,
    models::{Canteen, Feedback, MenuItem, Order, User},
};

pub struct Db {
    pub users: Collection<User>,
    pub canteens: Collection<Canteen>,
    pub menu_items: Collection<MenuItem>,
    pub orders: Collection<Order>,
    pub feedback: Collection<Feedback>,
}

pub async fn init_mongo(config: &Config) -> Result<Db, mongodb::error::Error> {
    let client = match connect(&config.mongo_url).await {
        Ok(client) => client,
        Err(e) => {
            warn!(
                "Primary database {} unreachable ({e}), trying fallback {}",
                config.mongo_url, config.mongo_fallback_url
            );
            connect(&config.mongo_fallback_url).await?
        }
    };

    let db = client.database(&config.mongo_db);
    info!("Connected to database {}", config.mongo_db);

    let users = db.collection::<User>("users");
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    Ok(Db {
        users,
        canteens: db.collection("canteens"),
        menu_items: db.collection("menu_items"),
        orders: db.collection("orders"),
        feedback: db.collection("feedback"),
    })
}

async fn connect(url: &str) -> Result<Client, mongodb::error::Error> {
    let mut options = ClientOptions::parse(url).await?;
    options.server_selection_timeout = Some(Duration::from_secs(2));

    let client = Client::with_options(options)?;

    // Fail fast here instead of on the first query.
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await?;

    Ok(client)
}
