//! Syscall filters and their registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use socktest_core::Errno;

use crate::status::Status;

/// The category of wrapped call a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterType {
    /// `socket`.
    Socket,
    /// `connect`.
    Connect,
    /// `listen`.
    Listen,
    /// `accept` and `accept4`.
    Accept,
    /// `getsockopt` for int-valued options.
    GetsockoptInt,
    /// `close`.
    Close,
}

impl FilterType {
    pub const ALL: [FilterType; 6] = [
        FilterType::Socket,
        FilterType::Connect,
        FilterType::Listen,
        FilterType::Accept,
        FilterType::GetsockoptInt,
        FilterType::Close,
    ];
}

type FilterFn = dyn Fn(&Status) -> Result<Option<AfterFilter>, Errno> + Send + Sync;
type AfterFn = dyn FnOnce(&Status) -> Result<(), Errno> + Send;

/// Runs before a tracked syscall.
///
/// Returning `Err` cancels the call: the real syscall never runs and the
/// error goes to the caller. Returning `Ok(Some(after))` schedules `after`
/// to run once the syscall and the switch's bookkeeping are done.
#[derive(Clone)]
pub struct Filter(Arc<FilterFn>);

impl Filter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Status) -> Result<Option<AfterFilter>, Errno> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A filter that cancels every call with `errno`.
    #[must_use]
    pub fn fail(errno: Errno) -> Self {
        Self::new(move |_| Err(errno))
    }

    /// A filter that lets every call through and then runs `after` on the
    /// updated status.
    pub fn then<F>(after: F) -> Self
    where
        F: Fn(&Status) -> Result<(), Errno> + Send + Sync + 'static,
    {
        let after = Arc::new(after);
        Self::new(move |_| {
            let after = Arc::clone(&after);
            Ok(Some(AfterFilter::new(move |so| after(so))))
        })
    }

    pub fn apply(&self, so: &Status) -> Result<Option<AfterFilter>, Errno> {
        (self.0)(so)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// Runs after a tracked syscall. An error replaces whatever the call would
/// have returned.
pub struct AfterFilter(Box<AfterFn>);

impl AfterFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&Status) -> Result<(), Errno> + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub fn apply(self, so: &Status) -> Result<(), Errno> {
        (self.0)(so)
    }
}

impl fmt::Debug for AfterFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AfterFilter(..)")
    }
}

/// At most one filter per type; the last `set` wins.
#[derive(Debug, Default)]
pub(crate) struct FilterRegistry {
    filters: RwLock<HashMap<FilterType, Filter>>,
}

impl FilterRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, filter_type: FilterType, filter: Option<Filter>) {
        let mut filters = self.filters.write();
        match filter {
            Some(filter) => {
                filters.insert(filter_type, filter);
            }
            None => {
                filters.remove(&filter_type);
            }
        }
    }

    /// Run the registered filter for `filter_type`, if any. The registry
    /// lock is released before the filter runs so filters may call `set`.
    pub(crate) fn apply(
        &self,
        filter_type: FilterType,
        so: &Status,
    ) -> Result<Option<AfterFilter>, Errno> {
        let filter = self.filters.read().get(&filter_type).cloned();
        match filter {
            Some(filter) => filter.apply(so),
            None => Ok(None),
        }
    }
}
