/// A named per-table change stream exposed by the source.
///
/// The engine ships three capture instances. Adding a fourth means adding a
/// variant here, a `ChangeRow` type, a staging table, and wiring it into the
/// projections that need it — there is no generic row representation to
/// extend instead (SPEC_FULL.md §9: tagged variants over a row map).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Capture {
    Orders,
    Customers,
    Payments,
}

impl Capture {
    pub const ALL: [Capture; 3] = [Capture::Orders, Capture::Customers, Capture::Payments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capture::Orders => "orders",
            Capture::Customers => "customers",
            Capture::Payments => "payments",
        }
    }

    pub fn staging_table(&self) -> &'static str {
        match self {
            Capture::Orders => "stg_cdc_orders",
            Capture::Customers => "stg_cdc_customers",
            Capture::Payments => "stg_cdc_payments",
        }
    }
}

impl std::fmt::Display for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0:?} is not a recognized capture instance")]
pub struct UnknownCapture(String);

impl std::str::FromStr for Capture {
    type Err = UnknownCapture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orders" => Ok(Capture::Orders),
            "customers" => Ok(Capture::Customers),
            "payments" => Ok(Capture::Payments),
            other => Err(UnknownCapture(other.to_string())),
        }
    }
}
