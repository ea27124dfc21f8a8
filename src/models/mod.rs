pub mod application;
pub mod lease;
pub mod message;
pub mod notification;
pub mod payment;
pub mod property;
pub mod user;
pub mod viewing;
pub mod workflow;

pub use application::*;
pub use lease::*;
pub use message::*;
pub use notification::*;
pub use payment::*;
pub use property::*;
pub use user::*;
pub use viewing::*;
pub use workflow::*;

pub use crate::lifecycle::{ApplicationStatus, ViewingStatus};
