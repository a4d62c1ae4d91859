//! Device domain entities.

pub mod model;

pub use model::{Device, DeviceType, NewDevice};
