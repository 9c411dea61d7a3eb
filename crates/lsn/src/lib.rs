//! The [`Lsn`] value type: a 10-byte opaque, totally ordered log-sequence number.
//!
//! Every boundary that accepts bytes from a driver or from configuration
//! (source query results, staged rows, checkpoints) normalizes through
//! [`Lsn::pad`] before comparison or storage. Comparing un-padded byte
//! slices directly is a bug: a 4-byte and a 10-byte encoding of the same
//! logical position are not equal under plain `[u8]` ordering.

use std::fmt;

pub const LEN: usize = 10;

/// An opaque, totally ordered log-sequence number.
///
/// Ordering is unsigned lexicographic byte comparison, which `derive(Ord)`
/// gives us for free over `[u8; 10]`. The all-zero value means "never
/// ingested" ([`Lsn::is_zero`]).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn([u8; LEN]);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lsn has {0} bytes, which is more than the maximum of {LEN}")]
    TooLong(usize),
    #[error("invalid hex encoding of an lsn")]
    Hex(#[from] hex::FromHexError),
}

impl Lsn {
    pub const ZERO: Lsn = Lsn([0u8; LEN]);

    /// Left-pads `bytes` with zeros to [`LEN`] bytes. Fails if `bytes` is
    /// already longer than [`LEN`], since that can't be a valid LSN from any
    /// driver this engine understands.
    pub fn pad(bytes: &[u8]) -> Result<Lsn, Error> {
        if bytes.len() > LEN {
            return Err(Error::TooLong(bytes.len()));
        }
        let mut padded = [0u8; LEN];
        padded[LEN - bytes.len()..].copy_from_slice(bytes);
        Ok(Lsn(padded))
    }

    pub fn from_hex(hex: &str) -> Result<Lsn, Error> {
        let bytes = hex::decode(hex.trim_start_matches("0x"))?;
        Lsn::pad(&bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; LEN]
    }

    pub fn as_bytes(&self) -> &[u8; LEN] {
        &self.0
    }

    /// Returns the next representable LSN, treating `self` as a closed lower
    /// bound primitive the way a source's own "next LSN" function would.
    /// When the source doesn't expose such a primitive, callers should
    /// instead use `self` itself as an *exclusive* lower bound (a half-open
    /// window) rather than calling `increment`; mixing the two conventions
    /// within one capture is a correctness bug (see `SPEC_FULL.md` §9).
    pub fn increment(&self) -> Option<Lsn> {
        let mut next = self.0;
        for byte in next.iter_mut().rev() {
            if *byte == u8::MAX {
                *byte = 0;
            } else {
                *byte += 1;
                return Some(Lsn(next));
            }
        }
        None // overflowed past the maximum representable LSN.
    }

    pub fn min(a: Lsn, b: Lsn) -> Lsn {
        std::cmp::min(a, b)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lsn({})", self.to_hex())
    }
}

impl std::str::FromStr for Lsn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lsn::from_hex(s)
    }
}

impl serde::Serialize for Lsn {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Lsn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        Lsn::from_hex(raw.as_ref()).map_err(|err| D::Error::custom(format!("invalid lsn: {err}")))
    }
}

/// Maps `Lsn` to a Postgres `bytea` column, so repositories can bind and
/// fetch it like any other scalar instead of going through a `Vec<u8>`
/// intermediate at every call site.
#[cfg(feature = "sqlx-support")]
mod sqlx_support {
    use super::Lsn;

    impl sqlx::Type<sqlx::Postgres> for Lsn {
        fn type_info() -> sqlx::postgres::PgTypeInfo {
            <Vec<u8> as sqlx::Type<sqlx::Postgres>>::type_info()
        }
        fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
            <Vec<u8> as sqlx::Type<sqlx::Postgres>>::compatible(ty)
        }
    }

    impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Lsn {
        fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
            let bytes = <Vec<u8> as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
            Ok(Lsn::pad(&bytes)?)
        }
    }

    impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Lsn {
        fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
            <&[u8] as sqlx::Encode<'q, sqlx::Postgres>>::encode(self.as_bytes().as_slice(), buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_lsn_is_zero() {
        assert!(Lsn::ZERO.is_zero());
        assert!(Lsn::pad(&[]).unwrap().is_zero());
        assert!(Lsn::pad(&[0, 0]).unwrap().is_zero());
    }

    #[test]
    fn pad_rejects_oversized_input() {
        assert!(matches!(Lsn::pad(&[0u8; 11]), Err(Error::TooLong(11))));
    }

    #[test]
    fn pad_is_idempotent() {
        let once = Lsn::pad(&[1, 2, 3]).unwrap();
        let twice = Lsn::pad(once.as_bytes()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn compare_matches_unpadded_ordering_once_padded() {
        let a = Lsn::pad(&[0x01]).unwrap();
        let b = Lsn::pad(&[0x02]).unwrap();
        assert!(a < b);

        let a_pre_padded = Lsn::pad(a.as_bytes()).unwrap();
        let b_pre_padded = Lsn::pad(b.as_bytes()).unwrap();
        assert_eq!(a.cmp(&b), a_pre_padded.cmp(&b_pre_padded));
    }

    #[test]
    fn increment_carries_across_bytes() {
        let lsn = Lsn::pad(&[0x01, 0xff]).unwrap();
        let next = lsn.increment().unwrap();
        assert_eq!(next, Lsn::pad(&[0x02, 0x00]).unwrap());
    }

    #[test]
    fn hex_round_trips() {
        let lsn = Lsn::pad(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        let hex = lsn.to_hex();
        assert_eq!(Lsn::from_hex(&hex).unwrap(), lsn);
    }

    #[test]
    fn total_order_across_bootstrap_example() {
        // From SPEC_FULL.md scenario 1.
        let a = Lsn::from_hex("0x01").unwrap();
        let b = Lsn::from_hex("0x02").unwrap();
        assert!(Lsn::ZERO < a && a < b);
        assert_eq!(Lsn::min(a, b), a);
    }
}
