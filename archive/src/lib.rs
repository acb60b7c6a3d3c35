//! `docarchive` records successive versions of application documents, deduplicates
//! their binary attachments via content-addressable storage, and maintains an
//! auditable history of container membership -- including deletions and moves across
//! containers. It is embedded by an application that assigns stable integer
//! identifiers ("docids") to its documents and containers and periodically calls the
//! archive to snapshot their state.
//!
//! ## Getting started
//!
//! ```rust
//! use docarchive::archive::Archive;
//! use docarchive::config::ArchiveConfig;
//! use docarchive::model::{ClassDescriptor, ClassResolver, VersionInput};
//! use docarchive::storage::memory::MemoryEngine;
//! use std::any::TypeId;
//!
//! struct Report;
//!
//! struct AppResolver;
//! impl ClassResolver for AppResolver {
//!     fn resolve(&self, module: &str, name: &str) -> Option<TypeId> {
//!         match (module, name) {
//!             ("app", "Report") => Some(TypeId::of::<Report>()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! fn run() -> docarchive::error::CResult<()> {
//!     let archive = Archive::new(MemoryEngine::new(), ArchiveConfig::default(), Box::new(AppResolver));
//!     let mut txn = archive.begin();
//!
//!     let version = archive.archive_version(&mut txn, VersionInput {
//!         docid: 4,
//!         class: ClassDescriptor { module: "app".into(), name: "Report".into(), type_id: TypeId::of::<Report>() },
//!         created: chrono::Utc::now(),
//!         modified: chrono::Utc::now(),
//!         path: "/reports/4".into(),
//!         user: "alice".into(),
//!         title: Some("Q1 summary".into()),
//!         description: None,
//!         attrs: None,
//!         comment: None,
//!         blobs: vec![],
//!     })?;
//!     assert_eq!(version, 1);
//!
//!     txn.commit()
//! }
//!
//! run().unwrap();
//! ```

pub mod archive;
pub mod blob_store;
pub mod class_registry;
pub mod codec;
pub mod config;
pub mod container_differ;
pub mod error;
pub mod keys;
pub mod model;
pub mod pool;
pub mod shredder;
pub mod storage;
pub mod traversal;
pub mod txn;
pub mod version_log;
