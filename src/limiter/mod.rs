//! Namespace quota policy
//!
//! Denies namespace creation once the number of existing namespaces whose
//! names match a configured regex reaches the configured limit.

pub mod counter;
pub mod engine;
pub mod pattern;

pub use counter::count_matching;
pub use engine::{ALLOWED_MESSAGE, Candidate, Decision, NamespaceLimiter, evaluate};
pub use pattern::NamePattern;
