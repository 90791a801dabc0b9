use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SortError;

/// Cooperative cancellation token.
///
/// Clones share the same flag. Once [Cancellation::cancel] is called a running sort stops at
/// the next batch boundary or merge checkpoint, removes its intermediate files and fails with
/// [SortError::Canceled].
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    canceled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), SortError> {
        if self.is_canceled() {
            Err(SortError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cancellation::Cancellation;
    use crate::error::SortError;

    #[test]
    fn test_clones_share_flag() {
        let cancellation = Cancellation::new();
        let clone = cancellation.clone();
        assert!(cancellation.check().is_ok());
        clone.cancel();
        assert!(cancellation.is_canceled());
        assert!(matches!(cancellation.check(), Err(SortError::Canceled)));
    }
}
