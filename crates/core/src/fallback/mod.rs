//! Local rule-based recommendations used when remote and cache are
//! unavailable.

pub mod ports;
pub mod rules;

pub use ports::FallbackGenerator;
pub use rules::BasicProtocolRules;
