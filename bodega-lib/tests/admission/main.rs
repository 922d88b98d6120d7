#![forbid(unsafe_code)]

mod helpers;

mod duplicate;
mod pipeline;
mod rate_limit;
mod session;
mod threat;
