mod api;
mod common;
mod config;
mod network;
mod realtime;
mod session;
mod storage;
mod sync;
mod ui;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use network::ChatClient;
use session::SessionStore;
use storage::SessionDatabase;
use tokio::sync::mpsc;
use ui::ChatApp;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "talksync", version, about = "Desktop chat client")]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Override the REST API base URL
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
    /// Override the realtime server URL
    #[arg(long, value_name = "URL")]
    server_url: Option<String>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
enum Mode {
    /// Confirm an email address with the token from the verification mail
    Verify { token: String },
}

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config)
        .apply_env(|key| std::env::var(key).ok())
        .with_overrides(cli.api_url.clone(), cli.server_url.clone());

    if let Some(Mode::Verify { token }) = &cli.mode {
        run_verify(&app_config, token).await;
        return Ok(());
    }

    run_full_client(app_config).await
}

async fn run_verify(app_config: &AppConfig, token: &str) {
    let api = match api::ApiClient::new(app_config.api_base_url.clone()) {
        Ok(api) => api,
        Err(err) => {
            eprintln!("Failed to set up HTTP client: {err}");
            std::process::exit(1);
        }
    };
    match api.verify_email(token).await {
        Ok(message) => {
            println!(
                "{}",
                message.unwrap_or_else(|| "Email verified successfully.".to_string())
            );
        }
        Err(err) => {
            eprintln!("{}", err.user_message("Email verification failed"));
            std::process::exit(1);
        }
    }
}

fn open_session_store(app_config: &AppConfig) -> SessionStore {
    if let Err(err) = storage::ensure_data_dir(&app_config.data_dir) {
        log::warn!("Failed to create data dir {}: {err}", app_config.data_dir);
    }
    let path = app_config.database_path();
    let db = match SessionDatabase::with_path(&path) {
        Ok(db) => db,
        Err(err) => {
            log::error!(
                "Failed to open {}: {err}; sessions will not persist",
                path.display()
            );
            match SessionDatabase::in_memory() {
                Ok(db) => db,
                Err(err) => {
                    log::error!("In-memory session storage unavailable: {err}");
                    std::process::exit(1);
                }
            }
        }
    };
    SessionStore::restore(db)
}

async fn run_full_client(app_config: AppConfig) -> Result<(), eframe::Error> {
    // 1. Tạo các kênh giao tiếp (Channels)
    // UI -> Network
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Network -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy Network Thread (Chạy ngầm)
    let session = open_session_store(&app_config);
    let client = match ChatClient::new(event_tx, cmd_rx, &app_config, session) {
        Ok(client) => client,
        Err(err) => {
            log::error!("Invalid client configuration: {err}");
            std::process::exit(1);
        }
    };
    tokio::spawn(async move {
        if let Err(err) = client.run().await {
            log::error!("Network client terminated: {err}");
        }
    });

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);
    log::info!(
        "Client started against {} (realtime {})",
        app_config.api_base_url,
        app_config.server_url
    );

    eframe::run_native(
        "TalkSync",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");
            Ok(Box::new(ChatApp::new(
                cc,
                app_config.clone(),
                cmd_tx.clone(),
                event_receiver,
            )))
        }),
    )
}
