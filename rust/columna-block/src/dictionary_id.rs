//! Process-unique identity of a physical dictionary payload.

use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Identity tag minted once per physically distinct dictionary payload.
///
/// Two dictionary blocks with equal ids reference identical dictionary contents,
/// which lets consumers evaluate per-value work once per dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DictionaryId {
    most_significant_bits: u64,
    least_significant_bits: u64,
    sequence_id: u64,
}

static NODE_ID: LazyLock<(u64, u64)> = LazyLock::new(|| Uuid::new_v4().as_u64_pair());

static SEQUENCE_GENERATOR: AtomicU64 = AtomicU64::new(0);

impl DictionaryId {
    pub fn new(most_significant_bits: u64, least_significant_bits: u64, sequence_id: u64) -> Self {
        DictionaryId {
            most_significant_bits,
            least_significant_bits,
            sequence_id,
        }
    }

    /// Mints a fresh id: the random node component of this process plus the
    /// next value of a process-wide sequence.
    pub fn random() -> Self {
        let (most_significant_bits, least_significant_bits) = *NODE_ID;
        DictionaryId {
            most_significant_bits,
            least_significant_bits,
            sequence_id: SEQUENCE_GENERATOR.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn most_significant_bits(&self) -> u64 {
        self.most_significant_bits
    }

    pub fn least_significant_bits(&self) -> u64 {
        self.least_significant_bits
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }
}

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            Uuid::from_u64_pair(self.most_significant_bits, self.least_significant_bits),
            self.sequence_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_are_distinct() {
        let first = DictionaryId::random();
        let second = DictionaryId::random();
        assert_ne!(first, second);
        assert_eq!(first.most_significant_bits(), second.most_significant_bits());
        assert_eq!(first.least_significant_bits(), second.least_significant_bits());
        assert!(second.sequence_id() > first.sequence_id());
    }

    #[test]
    fn test_explicit_id() {
        let id = DictionaryId::new(1, 2, 3);
        assert_eq!(id, DictionaryId::new(1, 2, 3));
        assert_eq!(
            id.to_string(),
            "00000000-0000-0001-0000-000000000002:3"
        );
    }
}
