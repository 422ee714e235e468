mod metrics;
mod replica;
mod service;

pub use metrics::*;
pub use replica::*;
pub use service::*;
