//! Property-based tests for URI handling and query rendering.
//!
//! These tests use proptest to verify structural properties over
//! randomly generated path shapes, catching edge cases that
//! example-based tests might miss.
//!
//! # Properties Tested
//!
//! 1. **Pk Extraction**: the trailing segment of any well-formed detail
//!    URI comes back out, with or without host and trailing slash
//! 2. **Target Inference**: namespace and resource name survive a
//!    round-trip through URI construction, even when a namespace
//!    segment equals the version string
//! 3. **Client Key Identity**: equal endpoint identities render equal
//!    keys, and credentials always change the key
//! 4. **Query Determinism**: the same criteria render the same
//!    parameter sequence regardless of insertion order

use proptest::prelude::*;
use proxy_kit::query::{Op, Query};
use proxy_kit::uri::{build_client_key, infer_target, parse_pk};

/// A URL-safe path segment that is neither empty nor `schema`.
fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_filter("reserved segment", |s| s != "schema")
}

fn pk() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,11}".prop_filter("reserved segment", |s| s != "schema")
}

proptest! {
    #[test]
    fn prop_parse_pk_extracts_trailing_segment(
        resource in segment(),
        key in pk(),
        trailing_slash in any::<bool>(),
    ) {
        let uri = if trailing_slash {
            format!("/api/v1/{}/{}/", resource, key)
        } else {
            format!("/api/v1/{}/{}", resource, key)
        };
        prop_assert_eq!(parse_pk(&uri).unwrap(), key);
    }

    #[test]
    fn prop_parse_pk_ignores_scheme_and_host(
        resource in segment(),
        key in pk(),
        port in 1024u16..9999,
    ) {
        let uri = format!("http://api.example.com:{}/api/v1/{}/{}/", port, resource, key);
        prop_assert_eq!(parse_pk(&uri).unwrap(), key);
    }

    #[test]
    fn prop_infer_target_round_trips(
        namespace in prop::option::of(segment()),
        resource in segment(),
        key in pk(),
    ) {
        let uri = match &namespace {
            Some(ns) => format!("/api/v1/{}/{}/{}/", ns, resource, key),
            None => format!("/api/v1/{}/{}/", resource, key),
        };

        let target = infer_target(&uri, "/api/", Some("v1")).unwrap();
        prop_assert_eq!(target.resource_name, resource);
        prop_assert_eq!(target.namespace, namespace.unwrap_or_default());
    }

    #[test]
    fn prop_infer_target_keeps_version_shaped_namespace(
        resource in segment(),
        key in pk(),
    ) {
        // Only the leading version segment is removed; a deeper segment
        // spelled like the version is a real namespace.
        let uri = format!("/api/v1/v1/{}/{}/", resource, key);
        let target = infer_target(&uri, "/api/", Some("v1")).unwrap();
        prop_assert_eq!(target.namespace, "v1");
        prop_assert_eq!(target.resource_name, resource);
    }

    #[test]
    fn prop_client_key_is_deterministic(
        host in segment(),
        namespace in prop::option::of(segment()),
        user in segment(),
        password in segment(),
    ) {
        let url = format!("http://{}.example.com/api/", host);
        let auth = (user, password);

        let a = build_client_key(&url, Some("v1"), namespace.as_deref(), Some(&auth));
        let b = build_client_key(&url, Some("v1"), namespace.as_deref(), Some(&auth));
        prop_assert_eq!(&a, &b);

        let anonymous = build_client_key(&url, Some("v1"), namespace.as_deref(), None);
        prop_assert_ne!(a, anonymous);
    }

    #[test]
    fn prop_namespace_changes_client_key(
        host in segment(),
        namespace in segment(),
    ) {
        let url = format!("http://{}.example.com/api/", host);
        let root = build_client_key(&url, Some("v1"), None, None);
        let namespaced = build_client_key(&url, Some("v1"), Some(&namespace), None);
        prop_assert_ne!(root, namespaced);
    }

    #[test]
    fn prop_query_rendering_is_order_independent(
        field_a in segment(),
        field_b in segment(),
        value_a in pk(),
        value_b in pk(),
    ) {
        prop_assume!(field_a != field_b);

        let forward = Query::new()
            .filter(&field_a, Op::Exact, value_a.as_str())
            .filter(&field_b, Op::Startswith, value_b.as_str());
        let backward = Query::new()
            .filter(&field_b, Op::Startswith, value_b.as_str())
            .filter(&field_a, Op::Exact, value_a.as_str());

        let forward: Vec<_> = forward.params().collect();
        let backward: Vec<_> = backward.params().collect();
        prop_assert_eq!(forward, backward);
    }
}
