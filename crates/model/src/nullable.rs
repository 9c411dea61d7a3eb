/// Common wrapper for a payload column that may be `NULL` at the source.
///
/// Every column of a change row other than its business key passes through
/// this type at the driver boundary (both the Postgres staging driver and
/// the embedded SQL host), so `NULL` handling is centralized instead of
/// re-derived per column type.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Nullable<T>(pub Option<T>);

impl<T> Nullable<T> {
    pub fn some(value: T) -> Self {
        Nullable(Some(value))
    }

    pub fn null() -> Self {
        Nullable(None)
    }

    pub fn into_inner(self) -> Option<T> {
        self.0
    }

    pub fn as_ref(&self) -> Nullable<&T> {
        Nullable(self.0.as_ref())
    }
}

impl Nullable<String> {
    /// The aggregate projection's rule for an absent customer segment:
    /// substitute the literal `"UNKNOWN"` rather than leaving the group-by
    /// key null, so minute/segment buckets stay stable (SPEC_FULL.md §9).
    pub fn segment_or_unknown(&self) -> String {
        self.0.clone().unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        Nullable(value)
    }
}

impl<T> From<Nullable<T>> for Option<T> {
    fn from(value: Nullable<T>) -> Self {
        value.0
    }
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Nullable(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_substitution_only_applies_when_null() {
        assert_eq!(Nullable::<String>::null().segment_or_unknown(), "UNKNOWN");
        assert_eq!(
            Nullable::some("SMB".to_string()).segment_or_unknown(),
            "SMB"
        );
    }
}
