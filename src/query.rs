//! Composed document queries and how a store evaluates them.
//!
//! A [`Query`] is a conjunction of [`Predicate`]s plus an optional grouping
//! with a minimum row count. Association predicates (tags, property pairs)
//! behave like inner joins: each matching association row counts once toward
//! the document's group, which lets "must carry all of these" be expressed
//! as `count >= n` instead of one join per required value.

use chrono::NaiveDate;
use globset::{GlobBuilder, GlobMatcher};

use crate::{
    error::{Error, Result},
    model::Document,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    FilenameEquals(String),
    /// Case-insensitive glob over the whole filename; `*` matches any run
    /// of characters.
    FilenameGlob(String),
    CreatedOn(NaiveDate),
    /// Inclusive on both ends.
    CreatedBetween(NaiveDate, NaiveDate),
    ParentPathEquals(String),
    /// Association: one row per document tag whose name is in the set.
    TagIn(Vec<String>),
    /// Association: one row per document property assignment equal to any
    /// of the `(property, value)` pairs.
    PropertyPairIn(Vec<(String, String)>),
}

impl Predicate {
    fn is_association(&self) -> bool {
        matches!(self, Predicate::TagIn(_) | Predicate::PropertyPairIn(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Document,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<GroupKey>,
    pub having_count_ge: usize,
}

impl Query {
    /// Compile glob predicates once so the query can be checked against many
    /// documents.
    pub fn matcher(&self) -> Result<QueryMatcher<'_>> {
        let globs = self
            .predicates
            .iter()
            .filter_map(|p| match p {
                Predicate::FilenameGlob(pattern) => Some(pattern),
                _ => None,
            })
            .map(|pattern| {
                GlobBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|g| g.compile_matcher())
                    .map_err(|e| {
                        Error::InvalidArgument(format!(
                            "invalid filename pattern {pattern:?}: {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryMatcher { query: self, globs })
    }
}

/// A [`Query`] ready to be evaluated document by document.
#[derive(Debug)]
pub struct QueryMatcher<'q> {
    query: &'q Query,
    globs: Vec<GlobMatcher>,
}

impl QueryMatcher<'_> {
    pub fn matches(&self, doc: &Document) -> bool {
        let mut globs = self.globs.iter();
        let mut rows = 0usize;
        let mut joined = false;

        for predicate in &self.query.predicates {
            let ok = match predicate {
                Predicate::FilenameEquals(name) => doc.filename() == name,
                Predicate::FilenameGlob(_) => globs
                    .next()
                    .is_some_and(|g| g.is_match(doc.filename())),
                Predicate::CreatedOn(date) => doc.creation_date() == *date,
                Predicate::CreatedBetween(begin, end) => {
                    (*begin..=*end).contains(&doc.creation_date())
                }
                Predicate::ParentPathEquals(path) => doc.parent_path() == path,
                Predicate::TagIn(names) => {
                    let n = doc
                        .tags()
                        .iter()
                        .filter(|t| names.contains(&t.name))
                        .count();
                    rows += n;
                    n > 0
                }
                Predicate::PropertyPairIn(pairs) => {
                    let n = doc
                        .properties()
                        .iter()
                        .filter(|set| {
                            pairs.iter().any(|(p, v)| {
                                set.property == *p && set.value == *v
                            })
                        })
                        .count();
                    rows += n;
                    n > 0
                }
            };
            if !ok {
                return false;
            }
            joined |= predicate.is_association();
        }

        if self.query.group_by.is_empty() {
            return true;
        }
        let group_rows = if joined { rows } else { 1 };
        group_rows >= self.query.having_count_ge
    }
}
