use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use chainsphere::api;
use chainsphere::blockchain;
use chainsphere::config::{Config, StorageConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config
    #[arg(long)]
    port: Option<u16>,
}

// Open the ledger on the configured storage, falling back to memory
fn initialize_blockchain(storage: &StorageConfig) -> anyhow::Result<blockchain::Blockchain> {
    let opened = storage
        .open()
        .map_err(blockchain::BlockchainError::from)
        .and_then(blockchain::Blockchain::open);

    match opened {
        Ok(blockchain) => {
            info!(
                "Loaded blockchain from {:?} storage at {} ({} blocks)",
                storage.backend,
                storage.path,
                blockchain.chain_length()
            );
            Ok(blockchain)
        }
        Err(err) => {
            warn!("Failed to load blockchain from storage: {}", err);
            warn!("Creating in-memory blockchain instead");

            blockchain::Blockchain::in_memory().context("Failed to create in-memory blockchain")
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_latest_block,
        api::handlers::add_block,
        api::handlers::get_block_by_hash,
        api::handlers::validate_chain,
        api::handlers::verify_data,
        api::handlers::clear_chain,
        api::handlers::get_sectors
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Sector,
            blockchain::ValidationReport,
            blockchain::validation::ChainBreak,
            blockchain::validation::BreakKind,
            api::handlers::ChainResponse,
            api::handlers::AddBlockRequest,
            api::handlers::VerifyRequest,
            api::handlers::VerifyResponse,
            api::handlers::ClearResponse,
            api::handlers::SectorResponse
        )
    ),
    tags(
        (name = "ledger", description = "ChainSphere ledger API endpoints")
    ),
    info(
        title = "ChainSphere API",
        version = "0.1.0",
        description = "Tamper-evident record ledger for agriculture, health and logistics",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(config.logging.level.as_str()));

    let blockchain = initialize_blockchain(&config.storage)?;
    let data = web::Data::new(blockchain.clone());

    let (host, port) = (config.server.host.clone(), config.server.port);
    info!("Starting HTTP server at http://{}:{}", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(data.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await?;

    info!("Server stopped, persisting chain");
    if let Err(err) = blockchain.shutdown() {
        error!("Final persist failed: {}", err);
        return Err(err.into());
    }

    Ok(())
}
