//! Two-accumulator running-sum checksum.
//!
//! Both accumulators are 8 bits wide and wrap on overflow:
//!
//! ```text
//! for x in payload:
//!     a = (a + x) mod 256
//!     b = (b + a) mod 256
//! ```
//!
//! The pair is sent `a` first, then `b`. It catches most single-byte
//! corruption and many transpositions on a quiet point-to-point line. It is
//! not a CRC and offers no protection against deliberate tampering.

/// A computed checksum pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checksum {
    pub a: u8,
    pub b: u8,
}

impl Checksum {
    /// Checksum of a complete payload.
    pub fn compute(payload: &[u8]) -> Self {
        let mut hasher = RunningSum::new();
        hasher.update(payload);
        hasher.finish()
    }

    /// Wire order: `a`, then `b`.
    pub fn to_bytes(self) -> [u8; 2] {
        [self.a, self.b]
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            a: bytes[0],
            b: bytes[1],
        }
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}{:02x}", self.a, self.b)
    }
}

/// Streaming form of [`Checksum::compute`].
///
/// Feeding a payload in several slices yields the same pair as feeding it at once.
#[derive(Debug, Clone, Default)]
pub struct RunningSum {
    a: u8,
    b: u8,
}

impl RunningSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &x in bytes {
            self.a = self.a.wrapping_add(x);
            self.b = self.b.wrapping_add(self.a);
        }
    }

    pub fn finish(&self) -> Checksum {
        Checksum {
            a: self.a,
            b: self.b,
        }
    }
}
