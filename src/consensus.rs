//src/consensus.rs

use crate::types::RankVector;

/// Collapses per-candidate rank vectors into the longest prefix on which
/// every candidate agrees.
///
/// Slots are compared least to most specific. The absent sentinel is a
/// value like any other: absent equals absent and differs from every
/// concrete name. Scanning stops at the first disagreeing slot, which is
/// left out together with everything after it. A single vector agrees with
/// itself everywhere and comes back whole.
pub fn collapse(vectors: &[RankVector]) -> RankVector {
    let Some((first, rest)) = vectors.split_first() else {
        return RankVector::new();
    };

    let mut consensus = RankVector::with_capacity(first.len());
    for (slot, value) in first.iter().enumerate() {
        if rest.iter().all(|other| other.get(slot) == Some(value)) {
            consensus.push(value.clone());
        } else {
            break;
        }
    }
    consensus
}
