mod build;

pub use build::*;

pub(crate) use crate::flags::Flags;
