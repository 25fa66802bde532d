//! Lazy query result cursor
//!
//! A backend adapter issues its native query up front and hands back a
//! [`RowSource`] wrapping the native cursor. [`QueryResults`] pulls rows from
//! it one at a time and narrows each to the query's row type.
//!
//! ## State Machine
//!
//! ```text
//! NotStarted --first pull--> Active --source empty / error--> Exhausted
//!      |                                                          ^
//!      +-------------------- release() / drop --------------------+
//! ```
//!
//! The source is released exactly once: on the transition to `Exhausted`,
//! or when the caller drops the cursor early. A cursor is single-pass and
//! cannot be restarted.

use crate::error::Result;
use crate::query::{QueryResultKind, QueryRow, ResultType};
use std::marker::PhantomData;

/// Backend cursor yielding canonical rows.
pub trait RowSource: Send {
    /// Next converted row, or `None` once the native cursor is drained.
    fn next_row(&mut self) -> Result<Option<QueryRow>>;

    /// Free the native cursor. Called at most once.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Active,
    Exhausted,
}

/// Forward-only, single-pass results of a [`Query<T>`](crate::Query).
///
/// Iterating yields `Result<T>`; a conversion error ends the sequence.
pub struct QueryResults<T> {
    source: Option<Box<dyn RowSource>>,
    state: State,
    peeked: Option<QueryRow>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: QueryResultKind> QueryResults<T> {
    /// Wrap a source whose native query has already been issued.
    pub fn new(source: Box<dyn RowSource>) -> Self {
        QueryResults {
            source: Some(source),
            state: State::NotStarted,
            peeked: None,
            _marker: PhantomData,
        }
    }

    /// Row shape this cursor yields.
    pub fn result_type(&self) -> ResultType {
        T::RESULT_TYPE
    }

    /// True if another row is available. Probes the source without
    /// consuming the row.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        match self.pull()? {
            Some(row) => {
                self.peeked = Some(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next row, or `None` when exhausted.
    pub fn next_result(&mut self) -> Result<Option<T>> {
        let row = match self.peeked.take() {
            Some(row) => row,
            None => match self.pull()? {
                Some(row) => row,
                None => return Ok(None),
            },
        };
        match T::from_row(row) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    /// True once the source has been drained or released.
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Stop early and free the native cursor.
    pub fn release(&mut self) {
        self.peeked = None;
        self.finish();
    }

    fn pull(&mut self) -> Result<Option<QueryRow>> {
        if self.state == State::Exhausted {
            return Ok(None);
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(None),
        };
        self.state = State::Active;
        match source.next_row() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    fn finish(&mut self) {
        self.state = State::Exhausted;
        if let Some(mut source) = self.source.take() {
            source.release();
        }
    }
}

impl<T: QueryResultKind> Iterator for QueryResults<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_result().transpose()
    }
}

impl<T> Drop for QueryResults<T> {
    fn drop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
        }
    }
}

impl<T> std::fmt::Debug for QueryResults<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("state", &self.state)
            .field("peeked", &self.peeked.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityBuilder};
    use crate::error::Error;
    use crate::key::{Key, KeyBuilder};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct VecSource {
        rows: VecDeque<Result<QueryRow>>,
        releases: Arc<AtomicUsize>,
    }

    impl RowSource for VecSource {
        fn next_row(&mut self) -> Result<Option<QueryRow>> {
            self.rows.pop_front().transpose()
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn key(id: i64) -> Key {
        KeyBuilder::new("p", "K").build_with_id(id).unwrap()
    }

    fn source(rows: Vec<Result<QueryRow>>) -> (Box<dyn RowSource>, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = VecSource {
            rows: rows.into(),
            releases: Arc::clone(&releases),
        };
        (Box::new(source), releases)
    }

    #[test]
    fn test_iterates_in_order_and_releases_once() {
        let (src, releases) = source((1..=3).map(|i| Ok(QueryRow::Key(key(i)))).collect());
        let mut results: QueryResults<Key> = QueryResults::new(src);
        assert_eq!(results.result_type(), ResultType::Key);

        let keys: Vec<Key> = results.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(keys, vec![key(1), key(2), key(3)]);
        assert!(results.is_exhausted());
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        assert!(results.next().is_none());
        drop(results);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_has_next_does_not_consume() {
        let (src, _) = source(vec![Ok(QueryRow::Key(key(1)))]);
        let mut results: QueryResults<Key> = QueryResults::new(src);
        assert!(results.has_next().unwrap());
        assert!(results.has_next().unwrap());
        assert_eq!(results.next_result().unwrap(), Some(key(1)));
        assert!(!results.has_next().unwrap());
        assert!(results.is_exhausted());
    }

    #[test]
    fn test_drop_releases_abandoned_cursor() {
        let (src, releases) = source((1..=3).map(|i| Ok(QueryRow::Key(key(i)))).collect());
        let mut results: QueryResults<Key> = QueryResults::new(src);
        assert!(results.next().is_some());
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        drop(results);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_release() {
        let (src, releases) = source(vec![Ok(QueryRow::Key(key(1)))]);
        let mut results: QueryResults<Key> = QueryResults::new(src);
        results.release();
        assert!(results.next().is_none());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_terminates_sequence() {
        let (src, releases) = source(vec![
            Ok(QueryRow::Key(key(1))),
            Err(Error::invalid_request("bad row")),
            Ok(QueryRow::Key(key(3))),
        ]);
        let mut results: QueryResults<Key> = QueryResults::new(src);
        assert!(results.next().unwrap().is_ok());
        assert!(results.next().unwrap().is_err());
        assert!(results.next().is_none());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_row_shape_fails_loudly() {
        let entity = EntityBuilder::new().build_entity(key(1));
        let (src, releases) = source(vec![Ok(QueryRow::Entity(entity))]);
        let mut results: QueryResults<Key> = QueryResults::new(src);
        assert!(results.next().unwrap().unwrap_err().is_invalid_request());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entity_rows() {
        let entity = EntityBuilder::new().set("n", 1i64).build_entity(key(1));
        let (src, _) = source(vec![Ok(QueryRow::Entity(entity.clone()))]);
        let results: QueryResults<Entity> = QueryResults::new(src);
        let rows: Vec<Entity> = results.collect::<Result<_>>().unwrap();
        assert_eq!(rows, vec![entity]);
    }
}
