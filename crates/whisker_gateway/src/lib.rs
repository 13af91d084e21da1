pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
mod tcp;
mod udp;

pub use client::{FeedClient, PetClient};
pub use error::{ConnectionError, FramingError, MissingFieldError};
pub use server::{CatService, ShutdownHandle};
