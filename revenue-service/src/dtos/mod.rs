pub mod revenue;

pub use revenue::*;
