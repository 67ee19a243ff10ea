//! Typed Ceph subsystem operations
//!
//! One accessor per subsystem on [`CephClient`](crate::client::CephClient):
//!
//! ```ignore
//! let pool = client.pools().get(&ctx, "rbd").await?;
//! client.cluster_users().delete(&ctx, "client.test1").await?;
//! ```
//!
//! Each wrapper owns its URL templates, request / response shapes and the
//! projection rules between the dashboard's loose JSON and typed values.

pub mod cluster_conf;
pub mod cluster_user;
pub mod crush_rule;
pub mod erasure_code_profile;
pub mod mgr_module;
pub mod pool;
pub mod rgw;
pub mod wire;

pub use cluster_conf::{ClusterConfig, ConfigOption, SectionValue};
pub use cluster_user::{export_missing, Capabilities, CapabilityType, ClusterUser, ClusterUsers};
pub use crush_rule::{CreateCrushRule, CrushOp, CrushRuleInfo, CrushRules, CrushStepInfo};
pub use erasure_code_profile::{ErasureCodeProfileInfo, ErasureCodeProfiles};
pub use mgr_module::{MgrModuleInfo, MgrModules};
pub use pool::{PoolCompression, PoolInfo, PoolSpec, Pools};
pub use rgw::{
    CreateRgwUser, RgwS3KeyInfo, RgwSubuserInfo, RgwSwiftKeyInfo, RgwUser, RgwUsers, SubuserId,
    SubuserPermission, UpdateRgwUser,
};
