use serde::{Serialize, Serializer};
use std::fmt::{self, Debug, Display};

/// A Windows security identifier.
///
/// On the wire: revision (u8), sub-authority count (u8), a 48-bit big-endian identifier
/// authority, then `count` little-endian u32 sub-authorities.
#[derive(PartialOrd, PartialEq, Eq, Hash, Clone)]
pub struct Sid {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl Sid {
    /// On-wire size of a SID carrying `sub_authority_count` sub-authorities.
    pub fn wire_len(sub_authority_count: u8) -> usize {
        8 + usize::from(sub_authority_count) * 4
    }

    /// Parse one SID from `bytes`, which must hold exactly [`Sid::wire_len`] bytes.
    pub(crate) fn from_exact_bytes(bytes: &[u8]) -> Option<Sid> {
        let (&revision, rest) = bytes.split_first()?;
        let (&count, rest) = rest.split_first()?;
        if bytes.len() != Sid::wire_len(count) {
            return None;
        }

        let (authority_bytes, subs) = rest.split_at(6);
        let authority = authority_bytes
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

        let sub_authorities = subs
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Some(Sid {
            revision,
            authority,
            sub_authorities,
        })
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Authorities that do not fit in 32 bits are written as 48-bit hex.
        if self.authority >= 1 << 32 {
            write!(f, "S-{}-0x{:012X}", self.revision, self.authority)?;
        } else {
            write!(f, "S-{}-{}", self.revision, self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Serialize for Sid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
