use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::comparator::{KeyComparator, Lexicographic};
use crate::error::SortError;
use crate::order::Order;
use crate::record::{Header, Record};

/// Identifies the key column, either by name or by zero based position.
///
/// Converting from a string treats anything that parses as an integer as a position, so
/// `KeySpec::from("0")` is the first column and `KeySpec::from("id")` is the column named `id`.
///
/// # Examples
/// ```
/// use csv_external_sort::key_spec::KeySpec;
/// use csv_external_sort::record::Header;
///
/// let header = Header::parse("id,name,value".to_string(), ',');
/// assert_eq!(KeySpec::from("name").resolve(&header).unwrap(), 1);
/// assert_eq!(KeySpec::from("2").resolve(&header).unwrap(), 2);
/// assert!(KeySpec::from("missing").resolve(&header).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySpec {
    Name(String),
    Position(i64),
}

impl KeySpec {
    /// Resolve to a column position that is valid for `header`
    pub fn resolve(&self, header: &Header) -> Result<usize, SortError> {
        match self {
            KeySpec::Name(name) => {
                header.position(name).ok_or_else(
                    || SortError::UnknownColumn {
                        name: name.clone(),
                        header: header.columns().to_vec(),
                    }
                )
            }
            KeySpec::Position(position) => {
                if *position < 0 || *position as u64 >= header.len() as u64 {
                    Err(
                        SortError::KeyOutOfRange {
                            index: *position,
                            columns: header.len(),
                        }
                    )
                } else {
                    Ok(*position as usize)
                }
            }
        }
    }
}

impl From<&str> for KeySpec {
    fn from(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(position) => {
                KeySpec::Position(position)
            }
            Err(_) => {
                KeySpec::Name(value.to_string())
            }
        }
    }
}

impl From<String> for KeySpec {
    fn from(value: String) -> Self {
        KeySpec::from(value.as_str())
    }
}

impl From<usize> for KeySpec {
    fn from(value: usize) -> Self {
        KeySpec::Position(value as i64)
    }
}

impl Display for KeySpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySpec::Name(name) => {
                write!(f, "column '{}'", name)
            }
            KeySpec::Position(position) => {
                write!(f, "column #{}", position)
            }
        }
    }
}

/// A resolved key: the column position, the direction and the comparator. Run generation and
/// the merge must share the same instance so both phases order records identically.
#[derive(Clone)]
pub struct SortKey {
    index: usize,
    order: Order,
    comparator: Arc<dyn KeyComparator>,
}

impl SortKey {
    /// Lexicographic key at `index`
    pub fn new(index: usize, order: Order) -> SortKey {
        SortKey {
            index,
            order,
            comparator: Arc::new(Lexicographic),
        }
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn KeyComparator>) -> SortKey {
        self.comparator = comparator;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Compare two keys under the requested direction. `Less` means `a` goes first.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.order.apply(self.comparator.compare(a, b))
    }

    pub fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        self.compare(a.key(), b.key())
    }
}

impl Debug for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortKey")
            .field("index", &self.index)
            .field("order", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;
    use std::sync::Arc;

    use crate::error::SortError;
    use crate::key_spec::{KeySpec, SortKey};
    use crate::order::Order;
    use crate::record::Header;

    fn header() -> Header {
        Header::parse("id,name,value".to_string(), ',')
    }

    #[test]
    fn test_resolve_name() -> Result<(), anyhow::Error> {
        assert_eq!(KeySpec::from("id").resolve(&header())?, 0);
        assert_eq!(KeySpec::from("value").resolve(&header())?, 2);
        Ok(())
    }

    #[test]
    fn test_resolve_position() -> Result<(), anyhow::Error> {
        assert_eq!(KeySpec::from("1").resolve(&header())?, 1);
        assert_eq!(KeySpec::from(2_usize).resolve(&header())?, 2);
        Ok(())
    }

    #[test]
    fn test_unknown_column() {
        match KeySpec::from("Id").resolve(&header()) {
            Err(SortError::UnknownColumn { name, header }) => {
                assert_eq!(name, "Id");
                assert_eq!(header.len(), 3);
            }
            other => {
                panic!("unexpected result: {:?}", other)
            }
        }
    }

    #[test]
    fn test_position_out_of_range() {
        assert!(matches!(KeySpec::from("3").resolve(&header()), Err(SortError::KeyOutOfRange { index: 3, columns: 3 })));
        assert!(matches!(KeySpec::from("-1").resolve(&header()), Err(SortError::KeyOutOfRange { index: -1, .. })));
    }

    #[test]
    fn test_sort_key_direction() {
        let asc = SortKey::new(0, Order::Asc);
        let desc = SortKey::new(0, Order::Desc);
        assert_eq!(asc.compare("10", "2"), Ordering::Less);
        assert_eq!(desc.compare("10", "2"), Ordering::Greater);
        assert_eq!(desc.compare("a", "a"), Ordering::Equal);
    }

    #[test]
    fn test_sort_key_comparator() {
        let numeric = |a: &str, b: &str| a.parse::<i64>().unwrap_or(0).cmp(&b.parse::<i64>().unwrap_or(0));
        let key = SortKey::new(0, Order::Asc).with_comparator(Arc::new(numeric));
        assert_eq!(key.compare("10", "2"), Ordering::Greater);
    }
}
