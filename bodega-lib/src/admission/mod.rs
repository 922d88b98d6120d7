//! Message admission control: the four cooperating gates every inbound chat
//! message must clear before it reaches business logic, plus the pipeline
//! that runs them in a fixed order.

pub mod duplicate;
pub mod memory;
pub mod pipeline;
pub mod rate_limit;
pub mod session;
pub mod threat;
