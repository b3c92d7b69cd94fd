pub mod error;
pub mod permission;
pub mod token;

pub use error::AuthError;
pub use token::{Credential, TokenCodec, TokenPurpose, bearer_token};
