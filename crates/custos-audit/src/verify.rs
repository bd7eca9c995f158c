//! Tamper detection over stored events.
//!
//! Verification never throws for a finding: tampering is an expected
//! operational outcome, so every check returns a [`VerifyOutcome`] value
//! that compliance tooling can enumerate without exception handling.

use custos_crypto::{ChainHash, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::AuditEvent;
use crate::types::AuditId;

/// Outcome of verifying an event or a chain range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// Every check passed.
    Valid,
    /// The event's recomputed hash does not match its stored `this_hash`:
    /// a field was altered in place.
    HashMismatch {
        /// The altered event.
        audit_id: AuditId,
    },
    /// The stored hash is consistent but the signature does not verify:
    /// forged or substituted signature.
    SignatureInvalid {
        /// The event with the bad signature.
        audit_id: AuditId,
    },
    /// The chain link is severed at this event: its predecessor's hash does
    /// not continue into it (reordering, deletion, insertion, or an in-place
    /// mutation detected during a range walk).
    ChainBroken {
        /// The first event at which the chain no longer holds.
        audit_id: AuditId,
    },
    /// The requested event or range does not exist.
    NotFound,
}

impl VerifyOutcome {
    /// Whether verification found no issues.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::HashMismatch { audit_id } => {
                write!(f, "hash mismatch at {audit_id}")
            }
            Self::SignatureInvalid { audit_id } => {
                write!(f, "invalid signature at {audit_id}")
            }
            Self::ChainBroken { audit_id } => {
                write!(f, "chain broken at {audit_id}")
            }
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// Verify a single event's internal self-consistency.
///
/// Recomputes `this_hash` from the event's own fields (detecting in-record
/// tampering), then checks the signature over the recomputed hash (detecting
/// forged or substituted signatures).
///
/// This proves self-consistency only, not historical position; an event can
/// pass here and still sit outside its tenant's chain. Positional guarantees
/// require [`verify_chain`] up to the chain head.
#[must_use]
pub fn verify_event(event: &AuditEvent, public_key: &PublicKey) -> VerifyOutcome {
    let recomputed = event.compute_hash();
    if recomputed != event.this_hash {
        return VerifyOutcome::HashMismatch {
            audit_id: event.audit_id,
        };
    }
    if public_key
        .verify(recomputed.as_bytes(), &event.signature)
        .is_err()
    {
        return VerifyOutcome::SignatureInvalid {
            audit_id: event.audit_id,
        };
    }
    VerifyOutcome::Valid
}

/// Verify a contiguous run of events anchored at `anchor`.
///
/// `anchor` is the hash the first event's `prev_hash` must equal: the
/// genesis sentinel when the run starts a chain, or the preceding stored
/// event's `this_hash` otherwise.
///
/// Walks forward, stopping at the first break:
/// - a `prev_hash` that does not continue the chain is `ChainBroken` at that
///   event;
/// - an event whose recomputed hash no longer matches its stored `this_hash`
///   is also `ChainBroken` there, since its recorded hash no longer carries
///   the chain (point lookup via [`verify_event`] reports the same event as
///   `HashMismatch`);
/// - a consistent hash with a bad signature is `SignatureInvalid`.
#[must_use]
pub fn verify_chain(
    events: &[AuditEvent],
    anchor: &ChainHash,
    public_key: &PublicKey,
) -> VerifyOutcome {
    let mut expected_prev = *anchor;

    for event in events {
        if event.prev_hash != expected_prev {
            return VerifyOutcome::ChainBroken {
                audit_id: event.audit_id,
            };
        }

        match verify_event(event, public_key) {
            VerifyOutcome::Valid => {}
            VerifyOutcome::HashMismatch { audit_id } => {
                return VerifyOutcome::ChainBroken { audit_id };
            }
            other => return other,
        }

        expected_prev = event.this_hash;
    }

    VerifyOutcome::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use crate::types::TenantId;
    use custos_crypto::{KeyMaterial, KeyPair};
    use std::collections::BTreeMap;

    fn chain_of(material: &KeyMaterial, actions: &[&str]) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        let mut prev = ChainHash::genesis();
        for action in actions {
            let event = EventDraft::new(
                TenantId::new("t1").unwrap(),
                "alice",
                *action,
                "document:1",
                BTreeMap::from([("note".to_string(), "bit0".to_string())]),
                material.key_id(),
            )
            .seal(prev, material)
            .unwrap();
            prev = event.this_hash;
            events.push(event);
        }
        events
    }

    #[test]
    fn test_valid_chain() {
        let material = KeyMaterial::signing(KeyPair::generate());
        let events = chain_of(&material, &["upload", "summarize", "delete"]);

        for event in &events {
            assert_eq!(
                verify_event(event, material.public_key()),
                VerifyOutcome::Valid
            );
        }
        assert_eq!(
            verify_chain(&events, &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::Valid
        );
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let material = KeyMaterial::signing(KeyPair::generate());
        assert_eq!(
            verify_chain(&[], &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::Valid
        );
    }

    #[test]
    fn test_field_mutation_detected() {
        let material = KeyMaterial::signing(KeyPair::generate());
        let mut events = chain_of(&material, &["upload", "summarize"]);

        events[1]
            .metadata
            .insert("note".to_string(), "bit1".to_string());

        // Point verification: in-record tampering.
        assert_eq!(
            verify_event(&events[1], material.public_key()),
            VerifyOutcome::HashMismatch {
                audit_id: events[1].audit_id
            }
        );
        // Range verification: the chain no longer holds at that event.
        assert_eq!(
            verify_chain(&events, &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::ChainBroken {
                audit_id: events[1].audit_id
            }
        );
    }

    #[test]
    fn test_forged_signature_detected() {
        let material = KeyMaterial::signing(KeyPair::generate());
        let other = KeyMaterial::signing(KeyPair::generate());
        let mut events = chain_of(&material, &["upload"]);

        // Substitute a signature from a different key over the same hash.
        events[0].signature = other.sign(events[0].this_hash.as_bytes()).unwrap();

        assert_eq!(
            verify_event(&events[0], material.public_key()),
            VerifyOutcome::SignatureInvalid {
                audit_id: events[0].audit_id
            }
        );
    }

    #[test]
    fn test_mutated_and_resigned_event_breaks_chain_at_successor() {
        let material = KeyMaterial::signing(KeyPair::generate());
        let mut events = chain_of(&material, &["upload", "summarize", "delete"]);

        // An attacker with the signing key rewrites event 1 completely:
        // new content, recomputed hash, fresh valid signature.
        events[1].action = "nothing-to-see".to_string();
        events[1].this_hash = events[1].compute_hash();
        events[1].signature = material.sign(events[1].this_hash.as_bytes()).unwrap();

        // The event itself now passes point verification...
        assert_eq!(
            verify_event(&events[1], material.public_key()),
            VerifyOutcome::Valid
        );
        // ...but its successor's prev_hash exposes the rewrite.
        assert_eq!(
            verify_chain(&events, &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::ChainBroken {
                audit_id: events[2].audit_id
            }
        );
    }

    #[test]
    fn test_deletion_and_reordering_detected() {
        let material = KeyMaterial::signing(KeyPair::generate());
        let events = chain_of(&material, &["upload", "summarize", "delete"]);

        // Deletion of the middle event.
        let shortened = vec![events[0].clone(), events[2].clone()];
        assert_eq!(
            verify_chain(&shortened, &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::ChainBroken {
                audit_id: events[2].audit_id
            }
        );

        // Reordering.
        let swapped = vec![events[1].clone(), events[0].clone(), events[2].clone()];
        assert_eq!(
            verify_chain(&swapped, &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::ChainBroken {
                audit_id: events[1].audit_id
            }
        );
    }

    #[test]
    fn test_wrong_anchor_detected() {
        let material = KeyMaterial::signing(KeyPair::generate());
        let events = chain_of(&material, &["upload", "summarize"]);

        // Verifying from position 2 must anchor on event 1's hash.
        assert_eq!(
            verify_chain(&events[1..], &events[0].this_hash, material.public_key()),
            VerifyOutcome::Valid
        );
        assert_eq!(
            verify_chain(&events[1..], &ChainHash::genesis(), material.public_key()),
            VerifyOutcome::ChainBroken {
                audit_id: events[1].audit_id
            }
        );
    }
}
