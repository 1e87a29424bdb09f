//! Remote transports for the shared Upkeep workbook.
//!
//! Both implement [`upkeep_core::remote::RemoteStore`]:
//!
//! - [`HttpRemote`] speaks the contents protocol described in [`wire`] to a
//!   GitHub-style contents API or to `upkeep-server`;
//! - [`MemoryRemote`] keeps the document in process, for tests and demos.

pub mod error;
mod http;
mod memory;
pub mod wire;

pub use error::{Error, Result};
pub use http::{HttpRemote, RemoteConfig};
pub use memory::MemoryRemote;
