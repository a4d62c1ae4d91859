//! User domain entities.

pub mod model;
pub mod profile;

pub use model::{CreateUser, User, UserStatusChange};
pub use profile::{Profile, UpdateProfile};
