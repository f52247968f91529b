use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_service::clients::{HttpIdentityLookup, HttpPlaceResolver, S3MediaLocator};
use feed_service::db::{PgFeedStore, PgLikeStore, PgPostStore, PgRelationshipStore};
use feed_service::handlers::{self, AppState};
use feed_service::{Collaborators, Config, FeedPipeline, FollowService, PostService};

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},actix_web=info,sqlx=warn", default_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.app.log_level);
    info!("Starting feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let mut db_cfg = db_pool::DbConfig::for_service("feed-service");
    if db_cfg.database_url.is_empty() {
        db_cfg.database_url = config.database.url.clone();
    }
    db_cfg.max_connections = std::cmp::max(db_cfg.max_connections, config.database.max_connections);
    db_cfg.log_config();
    let pool = db_pool::create_pool(db_cfg)
        .await
        .context("failed to create database pool")?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;
        info!("Database migrations applied");
    }

    let s3 = s3_utils::S3Client::with_config(config.storage.s3.clone()).await;
    let identity = HttpIdentityLookup::new(&config.identity)
        .context("failed to build identity client")?;
    let places = HttpPlaceResolver::new(&config.geocoding)
        .context("failed to build geocoding client")?;

    let deps = Collaborators {
        posts: Arc::new(PgPostStore::new(pool.clone())),
        likes: Arc::new(PgLikeStore::new(pool.clone())),
        feeds: Arc::new(PgFeedStore::new(pool.clone())),
        relationships: Arc::new(PgRelationshipStore::new(pool.clone())),
        identity: Arc::new(identity),
        media: Arc::new(S3MediaLocator::new(&s3)),
        places: Arc::new(places),
    };

    let state = web::Data::new(AppState {
        feed: Arc::new(FeedPipeline::new(
            &deps,
            config.feed.clone(),
            config.storage.media_folder.clone(),
        )),
        posts: Arc::new(PostService::new(&deps)),
        follows: Arc::new(FollowService::new(
            deps.relationships.clone(),
            config.feed.max_page_size,
        )),
    });

    let bind = (config.app.host.clone(), config.app.port);
    info!("HTTP server listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(bind)
    .context("failed to bind HTTP listener")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("feed-service stopped");
    Ok(())
}
