pub mod paths;
pub mod serde;
