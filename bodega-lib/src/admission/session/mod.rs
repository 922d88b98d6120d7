//! Per-(customer, tenant) conversational state with idle/absolute expiry
//! and memory-pressure eviction. The store owns creation, lookup, refresh
//! and expiry; mutation of the session content is the business handler's
//! job.

mod step;
mod store;

pub use step::SessionStep;
pub use store::{
    CartLine, ContactInfo, Discount, Session, SessionKey, SessionStats, SessionStore,
};
