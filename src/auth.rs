//! Platform identities, redacted secrets, credentials, and end-user profiles.

pub mod credential;
pub mod id;
pub mod profile;
pub mod secret;

pub use credential::*;
pub use id::*;
pub use profile::*;
pub use secret::*;
