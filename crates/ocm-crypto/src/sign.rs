//! # Signing and Verification Orchestration
//!
//! Glue between the digest engine and a [`Signer`]/[`Verifier`].
//!
//! Verification is a two-step check. The signature bytes must verify
//! against the digest recorded next to them, *and* the descriptor content
//! must still normalise to that recorded digest. The second step is what
//! stops a valid signature from being paired with tampered content by
//! copying an old digest.
//!
//! Neither routine resolves component references or blobs. Reference
//! digests are pinned explicitly with [`pin_reference_digest`] and then
//! covered by the referencing descriptor's own digest.

use ocm_core::{
    digest_component_descriptor, ComponentDescriptor, ComponentReference, DigestEngine, DigestSpec,
    Hasher, HasherRegistry, Signature,
};

use crate::error::SignatureError;
use crate::signer::{Signer, Verifier};

/// Digest `cd`, sign the digest, and append the signature under `name`.
///
/// An existing signature with the same name is left in place. Lookups
/// return the first match, so a duplicate name appended later is shadowed.
pub fn sign_component_descriptor<S: Signer + ?Sized>(
    cd: &mut ComponentDescriptor,
    signer: &S,
    hasher: &Hasher,
    name: &str,
) -> Result<(), SignatureError> {
    let digest =
        digest_component_descriptor(cd, hasher).map_err(|e| SignatureError::Digest(e.into()))?;
    let signature = signer.sign(cd, &digest)?;

    if cd.signature(name).is_some() {
        tracing::warn!(component = %cd, signature = name, "appending duplicate signature name; lookups return the earlier one");
    }
    tracing::info!(component = %cd, signature = name, digest = %digest, "signed component descriptor");

    cd.add_signature(Signature {
        name: name.to_string(),
        digest,
        signature,
    });
    Ok(())
}

/// Verify the signature named `name` and that `cd` still matches its digest.
///
/// # Errors
///
/// - [`SignatureError::SignatureNotFound`]: no signature with that name.
/// - [`SignatureError::SignatureInvalid`]: the bytes do not verify.
/// - [`SignatureError::DigestMismatch`]: the signature is valid, but the
///   recomputed digest differs from the recorded one.
/// - [`SignatureError::Digest`]: the recorded algorithms are not available.
pub fn verify_signed_component_descriptor<V: Verifier + ?Sized>(
    cd: &ComponentDescriptor,
    verifier: &V,
    registry: &HasherRegistry,
    name: &str,
) -> Result<(), SignatureError> {
    let signature = get_signature_by_name(cd, name)?;
    verifier.verify(cd, signature)?;

    let recorded = &signature.digest;
    let computed = DigestEngine::new(registry).digest_with(
        cd,
        &recorded.normalisation_algorithm,
        &recorded.hash_algorithm,
    )?;
    if &computed != recorded {
        tracing::warn!(component = %cd, signature = name, recorded = %recorded, computed = %computed, "descriptor digest mismatch");
        return Err(SignatureError::DigestMismatch {
            name: name.to_string(),
            recorded: recorded.clone(),
            computed,
        });
    }
    tracing::info!(component = %cd, signature = name, "verified component descriptor");
    Ok(())
}

/// Return the first signature named `name`.
pub fn get_signature_by_name<'a>(
    cd: &'a ComponentDescriptor,
    name: &str,
) -> Result<&'a Signature, SignatureError> {
    cd.signature(name)
        .ok_or_else(|| SignatureError::SignatureNotFound {
            name: name.to_string(),
            component: cd.to_string(),
        })
}

/// Record the digest of `referenced` on `reference`.
///
/// The reference must name `referenced` by component name and version.
pub fn pin_reference_digest(
    reference: &mut ComponentReference,
    referenced: &ComponentDescriptor,
    engine: &DigestEngine<'_>,
    hash_algorithm: &str,
) -> Result<DigestSpec, SignatureError> {
    if reference.component_name != referenced.name() || reference.version != referenced.version() {
        return Err(SignatureError::ReferenceMismatch {
            reference: reference.name.clone(),
            component: referenced.to_string(),
        });
    }
    let digest = engine.digest_descriptor(referenced, hash_algorithm)?;
    tracing::debug!(reference = %reference.name, digest = %digest, "pinned reference digest");
    reference.digest = Some(digest.clone());
    Ok(digest)
}
