/// The kind of change a staged row represents.
///
/// Numeric values match the source's own change-operation encoding, so
/// they round-trip through the staging tables without translation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i16)]
pub enum Op {
    Delete = 1,
    Insert = 2,
    UpdateBefore = 3,
    UpdateAfter = 4,
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is not a valid change operation code")]
pub struct InvalidOp(i16);

impl TryFrom<i16> for Op {
    type Error = InvalidOp;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Op::Delete),
            2 => Ok(Op::Insert),
            3 => Ok(Op::UpdateBefore),
            4 => Ok(Op::UpdateAfter),
            other => Err(InvalidOp(other)),
        }
    }
}

impl From<Op> for i16 {
    fn from(op: Op) -> i16 {
        op as i16
    }
}

impl Op {
    /// `op = 3` rows are excluded from collapse-to-latest ranking before
    /// the rank is even computed (SPEC_FULL.md §4.7 step 6).
    pub fn is_update_before(&self) -> bool {
        matches!(self, Op::UpdateBefore)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_valid_codes() {
        for code in 1..=4i16 {
            let op = Op::try_from(code).unwrap();
            assert_eq!(i16::from(op), code);
        }
    }

    #[test]
    fn rejects_invalid_codes() {
        assert!(Op::try_from(0).is_err());
        assert!(Op::try_from(5).is_err());
    }
}
