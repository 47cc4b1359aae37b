//! End-to-end tests for the hub operator
//!
//! These tests need a Kubernetes cluster with the hub CRDs installed and the
//! operator running. They are ignored by default:
//!
//! ```bash
//! hub-operator --crd | kubectl apply -f -
//! cargo test --test kind -- --ignored
//! ```

mod kind_tests;
