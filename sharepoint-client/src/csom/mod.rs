//! CSOM Request Building Module
//!
//! The stateful "action over object-path" protocol: one logical operation
//! becomes a linked graph of numbered object-path nodes and action nodes,
//! rendered as a single XML request against
//! `{site}/_vti_bin/client.svc/ProcessQuery`. The server replies with a flat
//! JSON array demultiplexed by the response mapper.

pub mod builder;
pub mod id_provider;
pub mod identity;
pub mod object_path;

pub use builder::{CsomRequest, ObjectPathBuilder, UpdateMode};
pub use id_provider::IdProvider;
pub use identity::ObjectIdentity;
pub use object_path::{Action, ActionObjectPath, CsomValue, ObjectPath};
