use crate::Capture;

/// A materialized analytical view maintained by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Projection {
    OrdersKpi,
    OrdersLatest,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::OrdersKpi => "orders_kpi",
            Projection::OrdersLatest => "orders_latest",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Projection::OrdersKpi => "proj_orders_kpi",
            Projection::OrdersLatest => "proj_orders_latest",
        }
    }

    /// The captures this projection must see deltas across before it can
    /// build a new cycle, and whose checkpoints it advances together.
    pub fn bound_captures(&self) -> &'static [Capture] {
        match self {
            Projection::OrdersKpi => &[Capture::Orders, Capture::Customers, Capture::Payments],
            Projection::OrdersLatest => &[Capture::Orders, Capture::Customers],
        }
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
