//! Launch profile model and codecs
//!
//! - [`limits`]: resource-limit and CPU-affinity encoding
//! - [`context`]: session identity and scope
//! - [`launch`]: the composed profile and its decode policy
//! - [`transport`]: profile and secret channels

pub mod context;
pub mod launch;
pub mod limits;
pub(crate) mod reader;
pub mod transport;

pub use context::{SessionContext, SessionScope};
pub use launch::{ProcessConfig, SessionLaunchProfile, StdStreamBehavior};
pub use limits::{CpuAffinity, ResourceLimits};
