//! Pluggable credential checks.

use agora_core::AgoraResult;
use serde_json::Value;

/// Checks a claimed identity's credential and returns the granted rights.
///
/// Return an authentication error to refuse the claim.
///
/// Closures of the shape `Fn(&str, Option<&Value>) -> AgoraResult<Value>`
/// implement this trait.
///
/// ```
/// use agora_authority::CredentialVerifier;
/// use agora_core::AgoraError;
/// use serde_json::{json, Value};
///
/// let verifier = |identity: &str, credential: Option<&Value>| {
///     if credential == Some(&json!("secret")) {
///         Ok(json!(["admin"]))
///     } else {
///         Err(AgoraError::authentication(format!("bad credential for {identity}")))
///     }
/// };
/// assert!(verifier.verify("alice", Some(&json!("secret"))).is_ok());
/// assert!(verifier.verify("alice", None).is_err());
/// ```
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verifies `credential` for `identity`.
    fn verify(&self, identity: &str, credential: Option<&Value>) -> AgoraResult<Value>;
}

impl<F> CredentialVerifier for F
where
    F: Fn(&str, Option<&Value>) -> AgoraResult<Value> + Send + Sync + 'static,
{
    fn verify(&self, identity: &str, credential: Option<&Value>) -> AgoraResult<Value> {
        self(identity, credential)
    }
}
