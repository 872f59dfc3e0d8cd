/// Shared state threaded through every handler
use crate::{
    catalog::{
        CategoryIndex, CommentThreads, PlaylistLibrary, SubscriptionManager, UserDirectory,
        VideoCatalog, ViewTracker,
    },
    config::ServerConfig,
    db,
    error::{ApiError, ApiResult},
    media::{EventAuthenticator, MediaLifecycle},
    rate_limit::RateLimiter,
    reactions::ReactionLedger,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// One pool, one config, and the managers built over them
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub users: Arc<UserDirectory>,
    pub videos: Arc<VideoCatalog>,
    pub comments: Arc<CommentThreads>,
    pub playlists: Arc<PlaylistLibrary>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub views: Arc<ViewTracker>,
    pub categories: Arc<CategoryIndex>,
    pub reactions: Arc<ReactionLedger>,
    pub media: Arc<MediaLifecycle>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Validate config, open the pool, migrate, and wire the managers
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let users = Arc::new(UserDirectory::new(pool.clone()));
        let videos = Arc::new(VideoCatalog::new(
            pool.clone(),
            config.media.image_base_url.clone(),
        ));
        let comments = Arc::new(CommentThreads::new(pool.clone()));
        let playlists = Arc::new(PlaylistLibrary::new(pool.clone()));
        let subscriptions = Arc::new(SubscriptionManager::new(pool.clone()));
        let views = Arc::new(ViewTracker::new(pool.clone()));
        let categories = Arc::new(CategoryIndex::new(pool.clone()));
        let reactions = Arc::new(ReactionLedger::new(pool.clone()));

        let authenticator = EventAuthenticator::new(
            &config.media.webhook_secret,
            config.media.webhook_tolerance_secs,
        );
        let media = Arc::new(MediaLifecycle::new(
            pool.clone(),
            authenticator,
            config.media.image_base_url.clone(),
        ));

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            users,
            videos,
            comments,
            playlists,
            subscriptions,
            views,
            categories,
            reactions,
            media,
            rate_limiter,
        })
    }

    /// Create the data directory tree before the pool opens files there
    async fn ensure_directories(config: &ServerConfig) -> ApiResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                ApiError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// Public base URL, explicit or derived from host and port
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
