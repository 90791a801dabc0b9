use std::cmp::Ordering;

/// Sort order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl Order {
    /// Map `true` to [Order::Asc] and `false` to [Order::Desc]
    pub fn from_ascending(ascending: bool) -> Order {
        if ascending {
            Order::Asc
        } else {
            Order::Desc
        }
    }

    /// Apply the order to an ascending comparison result
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Order::Asc => {
                ordering
            }
            Order::Desc => {
                ordering.reverse()
            }
        }
    }
}
