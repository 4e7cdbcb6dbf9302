//! Repository traits for metadata operations.

pub mod credentials;
pub mod files;
pub mod keys;
pub mod users;

pub use credentials::CredentialRepo;
pub use files::FileRepo;
pub use keys::SigningKeyRepo;
pub use users::UserRepo;
