//! Argument formatting for dispatch calls.
//!
//! Pairs every element of the primary sequence with the fixed arguments.
//! The fixed bundle is stored once and shared, so each task sees the exact same
//! value rather than a per-task copy.

use std::sync::Arc;

/// One task's worth of input: submission index and primary element.
pub(crate) type Task<P> = (usize, P);

/// Fully materialized argument stream for one dispatch.
///
/// Element `i` is `(primary[i], fixed)`. The length always equals the number
/// of primary elements; there is no truncation or padding.
pub(crate) struct ArgumentStream<P, A> {
    primary: Vec<P>,
    fixed: Arc<A>,
}

impl<P, A> ArgumentStream<P, A> {
    pub(crate) fn new<I>(primary: I, fixed: A) -> Self
    where
        I: IntoIterator<Item = P>,
    {
        Self {
            primary: primary.into_iter().collect(),
            fixed: Arc::new(fixed),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.primary.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Borrowing view of the argument tuples, in submission order.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&P, &A)> + '_ {
        self.primary.iter().map(move |p| (p, self.fixed.as_ref()))
    }

    /// Splits the stream into indexed tasks and the shared fixed bundle.
    pub(crate) fn into_tasks(self) -> (std::vec::IntoIter<Task<P>>, Arc<A>) {
        let tasks: Vec<Task<P>> = self.primary.into_iter().enumerate().collect();
        (tasks.into_iter(), self.fixed)
    }
}
