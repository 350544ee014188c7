#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;


pub use self::index::{Controller, ControllerMetrics, Index, IndexMetrics, PolicyId, SharedIndex, Update};
