//! # Waymark Testkit
//!
//! Testing utilities for the Waymark ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Pinned canonical preimages for cross-implementation verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: An in-memory registry wired to a stub token ledger
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical identifier derivation:
//!
//! ```rust
//! use waymark_testkit::vectors::{all_vectors, checkpoint_from_vector};
//!
//! for vector in all_vectors() {
//!     let checkpoint = checkpoint_from_vector(&vector);
//!     println!("{}: {}", vector.name, checkpoint.id.to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use waymark_testkit::generators::{checkpoint_from_params, DerivationParams};
//!
//! proptest! {
//!     #[test]
//!     fn checkpoint_id_is_deterministic(params: DerivationParams) {
//!         let a = checkpoint_from_params(&params);
//!         let b = checkpoint_from_params(&params);
//!         prop_assert_eq!(a.id, b.id);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up registry scenarios:
//!
//! ```rust
//! use waymark::EntitlementPolicy;
//! use waymark_testkit::fixtures::TestFixture;
//!
//! # async fn demo() -> waymark::Result<()> {
//! let fixture = TestFixture::new();
//! let stream = fixture
//!     .create_stream("demo", EntitlementPolicy::Allowlist { open: true })
//!     .await?;
//! fixture.publish(&stream, "v1").await?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{accounts, LedgerStub, TestFixture};
pub use generators::{checkpoint_from_params, preimage_from_params, DerivationParams};
pub use vectors::{all_vectors, checkpoint_from_vector, verify_all_vectors, GoldenVector};
