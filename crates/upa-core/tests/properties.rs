//! Property-Based Tests for call signing
//!
//! 1. Canonical encoding does not depend on object key order
//! 2. A signature covers the operation, the body and the nonce
//! 3. Region and nonce wire forms parse back to themselves

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use upa_core::canonical::{canonical_call, canonical_json};
use upa_core::{CertificateStore, KeyPair, MemoryCertificateStore, Nonce, Region, SignatureHandler};

fn handler_pair() -> (SignatureHandler, SignatureHandler) {
    let certs = Arc::new(MemoryCertificateStore::new());
    let client = KeyPair::generate("UpaClient");
    let broker = KeyPair::generate("UpaBroker");
    certs.register(client.certificate());
    certs.register(broker.certificate());
    let store: Arc<dyn CertificateStore> = certs;
    (
        SignatureHandler::new(client, store.clone()),
        SignatureHandler::new(broker, store),
    )
}

// =============================================================================
// Canonical encoding
// =============================================================================

proptest! {
    #[test]
    fn prop_canonical_ignores_insertion_order(
        entries in prop::collection::btree_map("[a-zA-Z_]{1,8}", -1000i64..1000, 1..12),
    ) {
        let forward: Map<String, Value> = entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let backward: Map<String, Value> = entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();

        prop_assert_eq!(
            canonical_json(&Value::Object(forward)),
            canonical_json(&Value::Object(backward))
        );
    }

    #[test]
    fn prop_canonical_is_valid_json(
        origin in "[A-Za-z ]{0,12}",
        price in any::<i64>(),
    ) {
        let body = json!({"origin": origin, "price": price, "tags": [1, "two", null]});
        let bytes = canonical_call("POST /v1/transports", &body);
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();

        prop_assert_eq!(&parsed["body"], &body);
        prop_assert_eq!(&parsed["operation"], "POST /v1/transports");
    }

    #[test]
    fn prop_distinct_operations_encode_differently(
        a in "[A-Z]{3,6} /[a-z/]{1,16}",
        b in "[A-Z]{3,6} /[a-z/]{1,16}",
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(canonical_call(&a, &Value::Null), canonical_call(&b, &Value::Null));
    }
}

// =============================================================================
// Signatures
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_signed_call_verifies_once(price in 0i64..1_000_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (client, broker) = handler_pair();
        let body = json!({"origin": "Lisboa", "destination": "Porto", "price": price});
        let metadata = client.sign("POST /v1/transports", &body);

        rt.block_on(async {
            let verified = broker.verify(&metadata, "POST /v1/transports", &body).await;
            prop_assert_eq!(verified.map(|v| v.name), Ok("UpaClient".to_string()));

            let replay = broker.verify(&metadata, "POST /v1/transports", &body).await;
            prop_assert!(replay.is_err());
            Ok(())
        })?;
    }

    #[test]
    fn prop_changed_price_breaks_signature(price in 0i64..1_000_000, delta in 1i64..1000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (client, broker) = handler_pair();
        let signed = json!({"origin": "Lisboa", "destination": "Porto", "price": price});
        let sent = json!({"origin": "Lisboa", "destination": "Porto", "price": price + delta});
        let metadata = client.sign("POST /v1/transports", &signed);

        let result = rt.block_on(broker.verify(&metadata, "POST /v1/transports", &sent));
        prop_assert!(result.is_err());
    }
}

// =============================================================================
// Wire forms
// =============================================================================

proptest! {
    #[test]
    fn prop_nonce_parses_back(ts in 0i64..i64::MAX, value in "[0-9a-f]{1,32}") {
        let nonce = Nonce::new(ts, value);
        prop_assert_eq!(nonce.to_string().parse::<Nonce>().unwrap(), nonce);
    }

    #[test]
    fn prop_region_names_parse_case_insensitively(index in 0usize..Region::ALL.len(), upper in any::<bool>()) {
        let region = Region::ALL[index];
        let name = if upper { region.name().to_uppercase() } else { region.name().to_lowercase() };
        prop_assert_eq!(name.parse::<Region>().unwrap(), region);
    }

    #[test]
    fn prop_unknown_locations_rejected(location in "[0-9]{1,8}") {
        prop_assert!(!Region::is_known(&location));
    }
}
