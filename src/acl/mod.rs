//! Access Control List (ACL) model and translation
//!
//! Entries start out carrying abstract client roles (producer, consumer,
//! connector, stream, query engine) and are translated into the concrete
//! operations of the authorization backend a cluster runs.

pub mod builder;
pub mod mapping;
pub mod operations;
pub mod patterns;
pub mod translate;

pub use builder::{build_acl_mapping, normalize_principal};
pub use mapping::{AclDetails, AclMapping, SideData};
pub use operations::{AbstractRole, AclBackend, AclOperation, NativeOperation, RbacRole};
pub use patterns::{determine_pattern_type, resource_pattern, PatternType, ResourceType, CLUSTER_RESOURCE_NAME};
pub use translate::{translate, Translation};
