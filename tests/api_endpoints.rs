//! Integration tests for the ChainSphere API endpoints
//!
//! These run the real router against an in-memory ledger and walk the
//! submit, lookup, verify, tamper-check and reset flow the view layer uses.

use actix_web::{test, web, App};
use serde_json::{json, Value};

use chainsphere::api::configure_routes;
use chainsphere::blockchain::Blockchain;

macro_rules! init_app {
    ($blockchain:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($blockchain.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

fn harvest() -> Value {
    json!({
        "farmName": "Sunny Valley",
        "cropType": "Wheat",
        "harvestDate": "2024-01-01",
        "location": "CA"
    })
}

#[actix_web::test]
async fn test_fresh_chain_endpoints() {
    let blockchain = Blockchain::in_memory().expect("Failed to create blockchain");
    let app = init_app!(blockchain);

    let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["length"], 1);
    assert_eq!(json["is_valid"], true);
    assert_eq!(json["chain"][0]["index"], 0);
    assert_eq!(json["chain"][0]["previousHash"], "0");
    assert_eq!(json["chain"][0]["sector"], "genesis");

    let req = test::TestRequest::get().uri("/api/v1/chain/latest").to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["index"], 0);

    let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["valid"], true);
    assert_eq!(json["checked_blocks"], 1);
    assert!(json["first_break"].is_null());
}

#[actix_web::test]
async fn test_submit_lookup_and_verify() {
    let blockchain = Blockchain::in_memory().expect("Failed to create blockchain");
    let genesis = blockchain.get_latest_block();
    let app = init_app!(blockchain);

    let req = test::TestRequest::post()
        .uri("/api/v1/blocks")
        .set_json(json!({ "sector": "agriculture", "data": harvest() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let block: Value = test::read_body_json(resp).await;
    assert_eq!(block["index"], 1);
    assert_eq!(block["previousHash"], genesis.hash.as_str());
    assert_eq!(block["data"]["cropType"], "Wheat");

    let hash = block["hash"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/blocks/{}", hash))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    let found: Value = test::read_body_json(resp).await;
    assert_eq!(found, block);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/blocks/{}", "0".repeat(64)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let req = test::TestRequest::post()
        .uri("/api/v1/verify")
        .set_json(json!({ "sector": "agriculture", "data": harvest() }))
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["verified"], true);
    assert_eq!(json["block"]["hash"], hash.as_str());

    let mut altered = harvest();
    altered["cropType"] = json!("Corn");
    let req = test::TestRequest::post()
        .uri("/api/v1/verify")
        .set_json(json!({ "sector": "agriculture", "data": altered }))
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["verified"], false);
    assert!(json["block"].is_null());

    let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["length"], 2);
    assert_eq!(json["is_valid"], true);
}

#[actix_web::test]
async fn test_invalid_sector_rejected() {
    let blockchain = Blockchain::in_memory().expect("Failed to create blockchain");
    let app = init_app!(blockchain);

    for sector in ["finance", "genesis", "Agriculture"] {
        let req = test::TestRequest::post()
            .uri("/api/v1/blocks")
            .set_json(json!({ "sector": sector, "data": harvest() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400, "sector {}", sector);
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/verify")
        .set_json(json!({ "sector": "finance", "data": harvest() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    assert_eq!(blockchain.chain_length(), 1);
}

#[actix_web::test]
async fn test_clear_chain_resets_to_genesis() {
    let blockchain = Blockchain::in_memory().expect("Failed to create blockchain");
    let genesis = blockchain.get_latest_block();
    let app = init_app!(blockchain);

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/api/v1/blocks")
            .set_json(json!({ "sector": "logistics", "data": { "shipmentId": "SHP-1" } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 201);
    }
    assert_eq!(blockchain.chain_length(), 4);

    let req = test::TestRequest::delete().uri("/api/v1/chain").to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["genesis"]["hash"], genesis.hash.as_str());

    assert_eq!(blockchain.get_chain(), vec![genesis]);
}

#[actix_web::test]
async fn test_sectors_report_counts() {
    let blockchain = Blockchain::in_memory().expect("Failed to create blockchain");
    let app = init_app!(blockchain);

    let req = test::TestRequest::post()
        .uri("/api/v1/blocks")
        .set_json(json!({ "sector": "health", "data": { "patientName": "Ada" } }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/v1/sectors").to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    let sectors = json.as_array().unwrap();

    assert_eq!(sectors.len(), 3);
    let health = sectors.iter().find(|s| s["sector"] == "health").unwrap();
    assert_eq!(health["block_count"], 1);
    assert_eq!(health["name"], "Health");
    assert!(health["fields"]
        .as_array()
        .unwrap()
        .contains(&json!("diagnosis")));

    let agriculture = sectors.iter().find(|s| s["sector"] == "agriculture").unwrap();
    assert_eq!(agriculture["block_count"], 0);
}
