use std::sync::Arc;

use gaen_exposure_server::auth::JwtAuth;
use gaen_exposure_server::fakekey::FakeKeyService;
use gaen_exposure_server::insert::manager::InsertManager;
use gaen_exposure_server::metrics::Metrics;
use gaen_exposure_server::store::exposed::ExposedStore;
use gaen_exposure_server::store::redeem::RedeemStore;
use gaen_exposure_server::store::shedlock::LeaseStore;
use gaen_exposure_server::time::{Clock, SystemClock};
use gaen_exposure_server::vault::KeyVault;
use gaen_exposure_server::{build_jwt_decoding_keys, db, load_keys, router, AppState};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or("gaen_exposure_server=info,tower_http=info".into()),
        )
        .json()
        .init();

    let config = gaen_exposure_server::config::Config::from_env();
    info!(port = config.port, "gaen exposure server starting");

    let pool = db::connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    db::ensure_schema(&pool).await.expect("failed to bootstrap schema");

    let mut vault = KeyVault::new();
    load_keys(&mut vault);
    let vault = Arc::new(vault);

    let exposed_store: Arc<dyn gaen_exposure_server::store::exposed::ExposedRepository> =
        Arc::new(ExposedStore::new(pool.clone()));
    let redeem_store = RedeemStore::new(pool.clone());
    let lease_store = LeaseStore::new(pool.clone(), format!("replica-{}", std::process::id()));
    let fake_key_service = Arc::new(FakeKeyService::new(
        config.random_key_amount,
        config.efgs_country_origin.clone(),
        config.efgs_report_type,
    ));
    if config.random_keys_enabled {
        fake_key_service.refresh(SystemClock.now_ms(), config.retention_days);
    }

    let insert_manager = Arc::new(InsertManager::for_exposed_endpoint(
        exposed_store.clone(),
        true,
        true,
    ));

    let auth: Arc<dyn gaen_exposure_server::auth::AuthAdapter> =
        Arc::new(JwtAuth::new(build_jwt_decoding_keys(&vault)));

    let metrics = Arc::new(Metrics::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let scheduler = Arc::new(gaen_exposure_server::scheduler::Scheduler::new(
        exposed_store.clone(),
        redeem_store,
        fake_key_service.clone(),
        lease_store,
        clock.clone(),
        config.clone(),
        metrics.clone(),
    ));
    scheduler.spawn();

    let state = AppState {
        config,
        clock,
        exposed_store,
        db_pool: pool,
        fake_key_service,
        insert_manager,
        auth,
        vault,
        metrics,
    };

    let port = state.config.port;
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown");
        })
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {e}");
            std::process::exit(1);
        });
}
