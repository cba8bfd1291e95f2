use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value as JsonValue};

use crate::{config::Config, utils::Context};

pub fn build_inscription_feed_predicate(config: &Config, start_block: u64) -> JsonValue {
    let mut networks = serde_json::Map::new();
    networks.insert(
        config.network.to_string(),
        json!({
            "start_block": start_block,
            "if_this": {
                "scope": "ordinals_protocol",
                "operation": "inscription_feed",
            },
            "then_that": {
                "http_post": {
                    "url": config.ingestion_callback_url(),
                    "authorization_header": format!("Bearer {}", config.ingestion.auth_token),
                }
            }
        }),
    );
    json!({
        "uuid": config.chainhook_node.predicate_uuid,
        "name": "ordledger",
        "version": 1,
        "chain": "bitcoin",
        "networks": networks,
    })
}

/// Replaces any predicate registered under our uuid, so restarts never stack
/// duplicate registrations upstream.
pub async fn register_inscription_feed_predicate(
    config: &Config,
    start_block: u64,
    ctx: &Context,
) -> Result<(), String> {
    let client = Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| format!("unable to build http client: {}", e))?;
    let rpc_url = config.chainhook_node.rpc_url.trim_end_matches('/');
    let uuid = &config.chainhook_node.predicate_uuid;

    let res = client
        .delete(format!("{}/v1/chainhooks/bitcoin/{}", rpc_url, uuid))
        .send()
        .await
        .map_err(|e| format!("unable to reach chainhook node: {}", e))?;
    match res.status() {
        status if status.is_success() => {
            try_info!(ctx, "Predicate {} deregistered", uuid);
        }
        StatusCode::NOT_FOUND => {}
        status => {
            return Err(format!(
                "unable to deregister predicate {}: status {}",
                uuid, status
            ))
        }
    }

    let predicate = build_inscription_feed_predicate(config, start_block);
    let res = client
        .post(format!("{}/v1/chainhooks", rpc_url))
        .json(&predicate)
        .send()
        .await
        .map_err(|e| format!("unable to reach chainhook node: {}", e))?;
    if !res.status().is_success() {
        return Err(format!(
            "unable to register predicate {}: status {}",
            uuid,
            res.status()
        ));
    }
    try_info!(
        ctx,
        "Predicate {} registered, streaming inscriptions from block #{} to {}",
        uuid,
        start_block,
        config.ingestion_callback_url()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::build_inscription_feed_predicate;
    use crate::config::Config;

    #[test]
    fn builds_predicate_for_configured_network() {
        let mut config = Config::testnet_default();
        config.ingestion.auth_token = "secret".into();
        config.ingestion.external_hostname = "indexer".into();

        let predicate = build_inscription_feed_predicate(&config, 2413343);
        assert_eq!(predicate["chain"], "bitcoin");
        assert_eq!(predicate["uuid"], config.chainhook_node.predicate_uuid.as_str());
        let network = &predicate["networks"]["testnet"];
        assert_eq!(network["start_block"], 2413343);
        assert_eq!(network["if_this"]["operation"], "inscription_feed");
        assert_eq!(
            network["then_that"]["http_post"]["url"],
            "http://indexer:3099/payload"
        );
        assert_eq!(
            network["then_that"]["http_post"]["authorization_header"],
            "Bearer secret"
        );
    }
}
