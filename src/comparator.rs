use std::cmp::Ordering;

/// Compares two key values in ascending order. The configured [Order](crate::order::Order) is
/// applied on top of the result.
///
/// Keys are passed as they appear in the file, without trimming or conversion. Any
/// `Fn(&str, &str) -> Ordering` closure is a comparator.
///
/// # Examples
/// ```
/// use std::cmp::Ordering;
/// use csv_external_sort::comparator::{KeyComparator, Lexicographic};
///
/// assert_eq!(Lexicographic.compare("10", "2"), Ordering::Less);
///
/// let by_length = |a: &str, b: &str| a.len().cmp(&b.len());
/// assert_eq!(by_length.compare("10", "2"), Ordering::Greater);
/// ```
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Byte-wise string comparison. Numeric looking keys are not treated as numbers, so "10"
/// sorts before "2".
#[derive(Clone, Copy, Debug, Default)]
pub struct Lexicographic;

impl KeyComparator for Lexicographic {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

impl<F> KeyComparator for F
    where F: Fn(&str, &str) -> Ordering + Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        self(a, b)
    }
}
