//! Backend for a real-estate brokerage: property listings, viewing
//! appointments and staff accounts, served as a JSON REST API.

pub mod api;
pub mod assignment;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod stores;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;

use api::ApiState;
use assignment::{RandomChooser, SystemClock};
use auth::Bcrypt;
use config::{AdminBootstrap, Config};
use models::{EmployeeStatus, NewUser, Role};
use stores::{FsImageStore, MemoryStore};

/// State backed by the in-memory store, the system clock and images under
/// `config.upload_dir`
pub fn build_state(config: &Config) -> ApiState {
    ApiState::in_memory(
        Arc::new(MemoryStore::new()),
        Arc::new(FsImageStore::new(config.upload_dir.clone())),
        Arc::new(Bcrypt::default()),
        Arc::new(SystemClock),
        Arc::new(RandomChooser),
    )
}

/// Create the configured admin account unless that email is already taken
pub async fn bootstrap_admin(state: &ApiState, admin: &AdminBootstrap) -> Result<()> {
    if state.users.find_by_email(&admin.email).await?.is_some() {
        info!(email = %admin.email, "Admin account already present");
        return Ok(());
    }

    let user = state
        .users
        .insert_user(NewUser {
            name: "Administrator".to_string(),
            email: admin.email.clone(),
            phone: None,
            address: None,
            username: Some("admin".to_string()),
            password_hash: state.hasher.hash(&admin.password)?,
            role: Role::Admin,
            image: None,
            status: EmployeeStatus::Available,
        })
        .await?;
    info!(user_id = user.id, email = %user.email, "Bootstrapped admin account");

    Ok(())
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn serve(config: Config) -> Result<()> {
    info!("Initializing state...");
    let state = build_state(&config);
    if let Some(admin) = &config.admin {
        bootstrap_admin(&state, admin).await?;
    }

    let app = api::build_router(state, config.max_upload_bytes, &config.upload_dir);

    let address = config.address();
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(upload_dir = %config.upload_dir.display(), "Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
