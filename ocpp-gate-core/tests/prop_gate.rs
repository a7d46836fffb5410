//! Property tests for the upgrade gate
//!
//! Invariants checked:
//! - Charge box id extraction over generated paths, with and without a query
//! - Known station + registered token is admitted to that token's endpoint
//! - Unknown station is rejected whatever protocol it offers
//! - Token lookup is exact and case-sensitive
//! - Repeating an attempt gives the same outcome

use std::collections::HashSet;
use std::sync::Arc;

use ocpp_gate_core::*;
use proptest::prelude::*;
use proptest::sample::Index;

#[derive(Debug)]
struct Endpoint(String);

impl EndpointHandler for Endpoint {
    fn protocol_token(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Path segment or charge box id (no '/' or '?')
fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._-]{1,12}"
}

/// Query string without '/'
fn query() -> impl Strategy<Value = String> {
    "[a-z0-9=&?.]{0,16}"
}

/// Distinct sub-protocol tokens
fn tokens() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("ocpp[0-9]\\.[0-9](\\.[0-9])?", 1..5)
        .prop_map(|set| set.into_iter().collect())
}

/// Distinct registered charge box ids
fn stations() -> impl Strategy<Value = HashSet<String>> {
    prop::collection::hash_set(segment(), 1..8)
}

fn gate(tokens: &[String], stations: &HashSet<String>) -> UpgradeGate<Endpoint, MemoryDirectory> {
    let registry = EndpointRegistry::new(tokens.iter().cloned().map(Endpoint).collect());
    let directory = MemoryDirectory::new();
    for station in stations {
        directory.register(station.as_str(), RegistrationStatus::Accepted);
    }
    UpgradeGate::new(Arc::new(registry), directory)
}

fn pick<'a>(items: &'a HashSet<String>, index: &Index) -> &'a String {
    let mut sorted: Vec<&String> = items.iter().collect();
    sorted.sort();
    sorted[index.index(sorted.len())]
}

// ============================================================================
// Charge box id extraction
// ============================================================================

proptest! {
    /// The last segment is the id
    #[test]
    fn extraction_takes_last_segment(
        prefix in prop::collection::vec(segment(), 0..4),
        id in segment(),
        trailing_slash in any::<bool>()
    ) {
        let mut path = String::new();
        for part in &prefix {
            path.push('/');
            path.push_str(part);
        }
        path.push('/');
        path.push_str(&id);
        if trailing_slash {
            path.push('/');
        }

        prop_assert_eq!(charge_box_id_from_path(&path), id.as_str());
    }

    /// A query without '/' is stripped
    #[test]
    fn extraction_strips_query(
        prefix in segment(),
        id in segment(),
        query in query()
    ) {
        let path = format!("/{}/{}?{}", prefix, id, query);
        prop_assert_eq!(charge_box_id_from_path(&path), id.as_str());
    }

    /// A bare id without separators is returned unchanged
    #[test]
    fn extraction_of_bare_id_is_identity(id in segment()) {
        prop_assert_eq!(charge_box_id_from_path(&id), id.as_str());
    }
}

// ============================================================================
// Admission and dispatch
// ============================================================================

proptest! {
    /// Known station + registered token goes to the endpoint with that token
    #[test]
    fn known_station_is_admitted_to_matching_endpoint(
        tokens in tokens(),
        stations in stations(),
        station_index in any::<Index>(),
        token_index in any::<Index>()
    ) {
        let gate = gate(&tokens, &stations);
        let id = pick(&stations, &station_index);
        let token = &tokens[token_index.index(tokens.len())];

        let admission = gate
            .upgrade(
                HandshakeAttempt::new(format!("/ocpp/{}?ts=1", id)).with_protocol(token.as_str()),
            )
            .unwrap();

        prop_assert_eq!(admission.protocol(), token.as_str());
        prop_assert_eq!(&admission.endpoint.0, token);
        prop_assert_eq!(admission.attempt.attributes.charge_box_id(), Some(id.as_str()));
    }

    /// Unknown station is refused before its protocol is considered
    #[test]
    fn unknown_station_is_rejected(
        tokens in tokens(),
        stations in stations(),
        unknown in segment(),
        protocol in proptest::option::of("[ -~]{0,12}")
    ) {
        prop_assume!(!stations.contains(&unknown));
        let gate = gate(&tokens, &stations);

        let attempt = HandshakeAttempt::new(format!("/ocpp/{}", unknown))
            .with_selected_protocol(protocol);
        let err = gate.upgrade(attempt).unwrap_err();

        prop_assert_eq!(err, GateError::UnknownDevice { charge_box_id: unknown });
    }

    /// Changing the case of a token or extending it never matches
    #[test]
    fn token_lookup_is_exact(
        tokens in tokens(),
        index in any::<Index>(),
        suffix in "[a-zA-Z0-9]{1,3}"
    ) {
        let registry = EndpointRegistry::new(tokens.iter().cloned().map(Endpoint).collect());
        let token = &tokens[index.index(tokens.len())];

        let upper = token.to_uppercase();
        prop_assert!(registry.find_handler(&upper).is_none());

        let extended = format!("{}{}", token, suffix);
        prop_assume!(!tokens.contains(&extended));
        prop_assert!(registry.find_handler(&extended).is_none());

        prop_assert_eq!(&registry.find_handler(token).unwrap().0, token);
    }

    /// Same attempt against unchanged state gives the same outcome
    #[test]
    fn repeated_attempts_agree(
        tokens in tokens(),
        stations in stations(),
        id in segment(),
        protocol in proptest::option::of("ocpp[0-9]\\.[0-9]")
    ) {
        let gate = gate(&tokens, &stations);
        let attempt = HandshakeAttempt::new(format!("/ocpp/{}", id))
            .with_selected_protocol(protocol);

        let outcome = |attempt: HandshakeAttempt| {
            gate.upgrade(attempt).map(|admission| admission.protocol().to_string())
        };

        prop_assert_eq!(outcome(attempt.clone()), outcome(attempt));
    }
}
