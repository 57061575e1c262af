mod component;
mod condition;
mod fingerprint;
mod rule;
mod rule_id;
mod status;

pub use component::*;
pub use condition::*;
pub use fingerprint::*;
pub use rule::*;
pub use rule_id::*;
pub use status::*;
