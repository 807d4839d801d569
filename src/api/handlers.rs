use actix_web::{web, HttpResponse, Responder};
use log::warn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::validation::{self, ValidationReport};
use crate::blockchain::{Block, BlockData, Blockchain, BlockchainError, Sector};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the add block endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AddBlockRequest {
    /// One of agriculture, health or logistics
    #[schema(example = "agriculture")]
    pub sector: String,

    /// The record fields
    #[schema(value_type = Object)]
    pub data: BlockData,
}

/// Request for the verify endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// The sector the record was submitted under
    #[schema(example = "health")]
    pub sector: String,

    /// The exact record fields to look for
    #[schema(value_type = Object)]
    pub data: BlockData,
}

/// Response for the verify endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    /// Whether a matching record exists on the chain
    pub verified: bool,

    /// The matching block
    pub block: Option<Block>,
}

/// Response for the clear endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ClearResponse {
    /// The message
    pub message: String,

    /// The genesis block of the reset chain
    pub genesis: Block,
}

/// A sector with its documented fields and current block count
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SectorResponse {
    pub sector: Sector,
    pub name: String,
    pub icon: String,
    pub fields: Vec<String>,
    pub block_count: usize,
}

fn error_response(err: BlockchainError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });

    match err {
        BlockchainError::InvalidSector(_) => HttpResponse::BadRequest().json(body),
        BlockchainError::ChainLink { .. } => HttpResponse::Conflict().json(body),
        BlockchainError::Persistence(_) => {
            warn!("Returning persistence failure to client: {}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": err.to_string(),
                "detail": "The ledger state is held in memory but is not yet durable"
            }))
        }
        BlockchainError::Hash(_) => HttpResponse::InternalServerError().json(body),
    }
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_chain();
    let is_valid = validation::validate(&chain, blockchain.hasher());

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get the latest block
#[utoipa::path(
    get,
    path = "/api/v1/chain/latest",
    responses(
        (status = 200, description = "Latest block retrieved successfully", body = Block)
    )
)]
pub async fn get_latest_block(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.get_latest_block())
}

/// Add a record
///
/// Creates a new block for the record and appends it to the chain
#[utoipa::path(
    post,
    path = "/api/v1/blocks",
    request_body = AddBlockRequest,
    responses(
        (status = 201, description = "Block added successfully", body = Block),
        (status = 400, description = "Unknown sector"),
        (status = 409, description = "Chain tip moved during append"),
        (status = 500, description = "Block could not be persisted")
    )
)]
pub async fn add_block(
    blockchain: BlockchainData,
    request: web::Json<AddBlockRequest>,
) -> impl Responder {
    let request = request.into_inner();

    let sector = match Sector::parse_user(&request.sector) {
        Ok(sector) => sector,
        Err(err) => return error_response(err),
    };

    match blockchain.add_block(sector, request.data) {
        Ok(block) => HttpResponse::Created().json(block),
        Err(err) => error_response(err),
    }
}

/// Find a block by hash
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{hash}",
    params(
        ("hash" = String, Path, description = "Hex encoded block hash")
    ),
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "No block with this hash")
    )
)]
pub async fn get_block_by_hash(
    blockchain: BlockchainData,
    hash: web::Path<String>,
) -> impl Responder {
    let hash = hash.into_inner();

    match blockchain.find_block_by_hash(hash.trim()) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Block with hash {} not found", hash)
        })),
    }
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain and reports the first broken block
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = ValidationReport)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let report: ValidationReport = blockchain.validation_report();
    HttpResponse::Ok().json(report)
}

/// Verify a record
///
/// Looks for a block holding exactly these fields under this sector
#[utoipa::path(
    post,
    path = "/api/v1/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 400, description = "Unknown sector")
    )
)]
pub async fn verify_data(
    blockchain: BlockchainData,
    request: web::Json<VerifyRequest>,
) -> impl Responder {
    let sector = match request.sector.parse::<Sector>() {
        Ok(sector) => sector,
        Err(err) => return error_response(err),
    };

    let block = blockchain.verify_data(sector, &request.data);

    HttpResponse::Ok().json(VerifyResponse {
        verified: block.is_some(),
        block,
    })
}

/// Clear the blockchain
///
/// Destroys all history and reseeds the chain with a fresh genesis block
#[utoipa::path(
    delete,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain cleared", body = ClearResponse),
        (status = 500, description = "Cleared chain could not be persisted")
    )
)]
pub async fn clear_chain(blockchain: BlockchainData) -> impl Responder {
    match blockchain.clear_chain() {
        Ok(genesis) => HttpResponse::Ok().json(ClearResponse {
            message: "Chain cleared".to_string(),
            genesis,
        }),
        Err(err) => error_response(err),
    }
}

/// List sectors
///
/// Returns every sector accepting records, its documented fields and how
/// many blocks it holds
#[utoipa::path(
    get,
    path = "/api/v1/sectors",
    responses(
        (status = 200, description = "Sectors retrieved successfully", body = Vec<SectorResponse>)
    )
)]
pub async fn get_sectors(blockchain: BlockchainData) -> impl Responder {
    let counts = blockchain.sector_counts();

    let sectors: Vec<SectorResponse> = Sector::USER_SECTORS
        .iter()
        .filter_map(|sector| sector.descriptor())
        .map(|descriptor| SectorResponse {
            sector: descriptor.sector,
            name: descriptor.name.to_string(),
            icon: descriptor.icon.to_string(),
            fields: descriptor.fields.iter().map(|f| f.to_string()).collect(),
            block_count: counts.get(&descriptor.sector).copied().unwrap_or(0),
        })
        .collect();

    HttpResponse::Ok().json(sectors)
}
