pub mod user_repository;

#[cfg(test)]
pub mod memory;

pub use user_repository::MongoUserRepository;

use crate::config::Settings;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

pub const USERS_COLLECTION: &str = "users";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    /// Builds the client and checks connectivity.
    ///
    /// Only an unparseable URL is an error. An unreachable server is logged and the
    /// app starts anyway; queries fail until it comes back.
    pub async fn connect(settings: &Settings) -> Result<Self, mongodb::error::Error> {
        let mut client_options = mongodb::options::ClientOptions::parse(&settings.mongodb_url).await?;

        client_options.max_pool_size = Some(settings.mongodb_pool_size);
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;
        let db = client.database(&settings.mongodb_database_name);
        let mongodb = Self { client, db };

        match mongodb.ping().await {
            Ok(()) => {
                log::info!("✅ MongoDB connected: {}", settings.mongodb_database_name);
                mongodb.ensure_indexes().await;
            }
            Err(e) => {
                log::warn!("⚠️  MongoDB connection failed: {}", e);
                log::warn!("⚠️  App will start but database operations will fail");
            }
        }

        Ok(mongodb)
    }

    pub async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Creates the user indexes. Failures are logged, never fatal.
    async fn ensure_indexes(&self) {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<Document>(USERS_COLLECTION);
        let unique_sparse = || {
            mongodb::options::IndexOptions::builder()
                .unique(true)
                .sparse(true)
                .build()
        };

        let indexes = [
            (
                "users(email) unique",
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique_sparse())
                    .build(),
            ),
            (
                "users(phone) unique",
                IndexModel::builder()
                    .keys(doc! { "phone": 1 })
                    .options(unique_sparse())
                    .build(),
            ),
            (
                "users(created_at)",
                IndexModel::builder().keys(doc! { "created_at": -1 }).build(),
            ),
        ];

        for (name, index) in indexes {
            match users.create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}", name),
                Err(e) => log::warn!("   ⚠️  Could not create index {}: {}", name, e),
            }
        }

        log::info!("✅ Database indexes ready");
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Closes pooled connections.
    pub async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        log::info!("🔌 MongoDB connection closed");
    }
}
