//! src/dispatcher/strategy.rs
//!
//! Dispatch strategies: how a running dispatch turns completions into results.
//!
//! Each mode is its own type implementing `DispatchStrategy`, with its own
//! output type:
//!
//! | Strategy            | Output                 | Order        | Blocking            |
//! |---------------------|------------------------|--------------|---------------------|
//! | `OrderedDispatch`   | `Vec<R>`               | input        | whole batch         |
//! | `UnorderedDispatch` | `UnorderedResults<R>`  | completion   | per `next()`        |
//! | `ModeDispatch`      | `Dispatched<R>`        | per mode     | per mode            |
//!
//! `ModeDispatch` exists for callers that pick the mode at runtime (e.g. from a
//! config string); code that knows its mode statically should use the concrete
//! strategy and get a concrete output type.

use std::iter::FusedIterator;

use super::mode::DispatchMode;
use super::workers::run::{Completion, DispatchRun};
use crate::error::DispatchError;

/// A way of running a dispatch and presenting its results.
pub trait DispatchStrategy: Send + Sync {
    /// What `TaskDispatcher::dispatch` returns for results of type `R`.
    type Output<R: Send + 'static>;

    /// The mode this strategy implements.
    fn mode(&self) -> DispatchMode;

    /// Consumes a started dispatch and produces the strategy's output.
    fn run<P, R>(&self, run: DispatchRun<P, R>) -> Result<Self::Output<R>, DispatchError>
    where
        P: Send + 'static,
        R: Send + 'static;
}

/// Blocking, all-or-nothing dispatch with results in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedDispatch;

impl DispatchStrategy for OrderedDispatch {
    type Output<R: Send + 'static> = Vec<R>;

    fn mode(&self) -> DispatchMode {
        DispatchMode::Ordered
    }

    /// Collects every completion into its submission slot.
    ///
    /// The first failed task fails the whole call; no partial results are
    /// returned.
    fn run<P, R>(&self, mut run: DispatchRun<P, R>) -> Result<Vec<R>, DispatchError>
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None)
            .take(run.total())
            .collect();

        while let Some(completion) = run.next_completion()? {
            let index = completion.index();
            slots[index] = Some(completion.into_result()?);
        }

        // Every index was filled exactly once by a completion.
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Streaming dispatch yielding results in completion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnorderedDispatch;

impl DispatchStrategy for UnorderedDispatch {
    type Output<R: Send + 'static> = UnorderedResults<R>;

    fn mode(&self) -> DispatchMode {
        DispatchMode::Unordered
    }

    fn run<P, R>(&self, run: DispatchRun<P, R>) -> Result<UnorderedResults<R>, DispatchError>
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        Ok(UnorderedResults::new(run))
    }
}

/// Strategy chosen from a `DispatchMode` value at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeDispatch(pub DispatchMode);

impl DispatchStrategy for ModeDispatch {
    type Output<R: Send + 'static> = Dispatched<R>;

    fn mode(&self) -> DispatchMode {
        self.0
    }

    fn run<P, R>(&self, run: DispatchRun<P, R>) -> Result<Dispatched<R>, DispatchError>
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        match self.0 {
            DispatchMode::Ordered => OrderedDispatch.run(run).map(Dispatched::Ordered),
            DispatchMode::Unordered => UnorderedDispatch.run(run).map(Dispatched::Unordered),
        }
    }
}

/// Results of a runtime-mode dispatch.
pub enum Dispatched<R> {
    Ordered(Vec<R>),
    Unordered(UnorderedResults<R>),
}

impl<R> Dispatched<R> {
    pub fn mode(&self) -> DispatchMode {
        match self {
            Dispatched::Ordered(_) => DispatchMode::Ordered,
            Dispatched::Unordered(_) => DispatchMode::Unordered,
        }
    }

    /// Gathers the results into a vector, draining an unordered stream.
    ///
    /// An unordered stream keeps its completion order; the first failure is
    /// returned as the error.
    pub fn into_vec(self) -> Result<Vec<R>, DispatchError> {
        match self {
            Dispatched::Ordered(results) => Ok(results),
            Dispatched::Unordered(stream) => stream.collect(),
        }
    }
}

impl<R> IntoIterator for Dispatched<R> {
    type Item = Result<R, DispatchError>;
    type IntoIter = DispatchedIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Dispatched::Ordered(results) => DispatchedIter::Ordered(results.into_iter()),
            Dispatched::Unordered(stream) => DispatchedIter::Unordered(stream),
        }
    }
}

/// Iterator over `Dispatched` results.
pub enum DispatchedIter<R> {
    Ordered(std::vec::IntoIter<R>),
    Unordered(UnorderedResults<R>),
}

impl<R> Iterator for DispatchedIter<R> {
    type Item = Result<R, DispatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            DispatchedIter::Ordered(results) => results.next().map(Ok),
            DispatchedIter::Unordered(stream) => stream.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            DispatchedIter::Ordered(results) => results.size_hint(),
            DispatchedIter::Unordered(stream) => stream.size_hint(),
        }
    }
}

/// Completion stream behind `UnorderedResults`, with the input type erased.
trait CompletionSource<R>: Send {
    fn next_completion(&mut self) -> Result<Option<Completion<R>>, DispatchError>;
    fn remaining(&self) -> usize;
}

impl<P, R> CompletionSource<R> for DispatchRun<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn next_completion(&mut self) -> Result<Option<Completion<R>>, DispatchError> {
        DispatchRun::next_completion(self)
    }

    fn remaining(&self) -> usize {
        self.total() - self.completed()
    }
}

/// Lazy, single-pass stream of results in completion order.
///
/// Each `next()` blocks until another task finishes. A task failure is yielded
/// as `Err` where it is observed; results yielded before it stay valid, and the
/// stream ends right after it. The worker pool is released as soon as the
/// stream ends, fails, or is dropped.
pub struct UnorderedResults<R> {
    source: Option<Box<dyn CompletionSource<R>>>,
}

impl<R: Send + 'static> UnorderedResults<R> {
    fn new<P: Send + 'static>(run: DispatchRun<P, R>) -> Self {
        Self {
            source: Some(Box::new(run)),
        }
    }
}

impl<R> UnorderedResults<R> {
    /// Results not yet yielded. Zero once the stream has ended or failed.
    pub fn remaining(&self) -> usize {
        self.source.as_ref().map_or(0, |source| source.remaining())
    }
}

impl<R> Iterator for UnorderedResults<R> {
    type Item = Result<R, DispatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let source = self.source.as_mut()?;

        let item = match source.next_completion() {
            Ok(Some(completion)) => completion.into_result(),
            Ok(None) => {
                self.source = None;
                return None;
            }
            Err(error) => Err(error),
        };

        if item.is_err() || self.remaining() == 0 {
            // Releases the pool
            self.source = None;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

impl<R> FusedIterator for UnorderedResults<R> {}

impl<R> std::fmt::Debug for UnorderedResults<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnorderedResults")
            .field("remaining", &self.remaining())
            .finish()
    }
}
