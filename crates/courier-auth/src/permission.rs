use courier_types::api::Role;

use crate::error::AuthError;
use crate::token::Credential;

/// Evaluate a decoded credential against a required role set. Pure
/// predicate over claims: no I/O, no side effects.
///
/// With `exclude = false` the credential's role must be a member of
/// `allowed`; with `exclude = true` the predicate is the exact negation.
/// A credential with no role claim is a member of nothing.
pub fn check(credential: &Credential, allowed: &[Role], exclude: bool) -> Result<(), AuthError> {
    let member = credential
        .role_claim()
        .is_some_and(|role| allowed.contains(&role));
    let passes = if exclude { !member } else { member };
    if passes { Ok(()) } else { Err(AuthError::Forbidden) }
}
