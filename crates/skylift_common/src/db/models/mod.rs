pub mod backend;
pub mod gateway;
pub mod gateway_compute;
pub mod project;
pub mod run;

pub use backend::{BACKENDS_WITH_PRIVATE_GATEWAY_SUPPORT, Backend, BackendType};
pub use gateway::{Gateway, GatewayConfiguration, GatewayInfo, GatewayStatus};
pub use gateway_compute::GatewayCompute;
pub use project::Project;
pub use run::{
    Job, ModelConfiguration, Run, RunSpec, ServiceConfiguration, ServiceModelSpec, ServiceSpec,
};
