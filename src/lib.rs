pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod shadow;
pub mod types;

pub use config::Config;
pub use network::Network;
pub use shadow::Session;

mod prelude {
    pub(crate) use crate::error::*;
    pub(crate) use crate::types::*;
    pub(crate) use std::{io, time};
}
