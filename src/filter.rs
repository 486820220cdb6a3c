//! Document filters and their composition into a single [`Query`].
//!
//! Every filter contributes two things: a piece of the store query
//! ([`QueryContribution`]) and a per-document accuracy used to rank results
//! after the query ran. Lower accuracy means a closer match.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};

use crate::{
    error::{Error, Result},
    model::Document,
    query::{GroupKey, Predicate, Query},
};

/// What one filter adds to the composed query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContribution {
    pub predicate: Option<Predicate>,
    pub group_by: Option<GroupKey>,
    pub having_count_ge: usize,
}

/// Documents must carry every named tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    names: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    fn contribution(&self) -> QueryContribution {
        if self.names.is_empty() {
            return QueryContribution::default();
        }
        QueryContribution {
            predicate: Some(Predicate::TagIn(
                self.names.iter().cloned().collect(),
            )),
            group_by: Some(GroupKey::Document),
            having_count_ge: self.names.len(),
        }
    }

    /// Extra, unrequested tags push a document down the ranking.
    fn accuracy(&self, doc: &Document) -> usize {
        doc.tags().len().saturating_sub(self.names.len())
    }
}

/// Documents must carry every `(property, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    pairs: BTreeSet<(String, String)>,
}

impl PropertyFilter {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build from a flat `[key, value, key, value, ...]` list.
    ///
    /// # Examples
    ///
    /// ```
    /// use docman::filter::PropertyFilter;
    ///
    /// let filter = PropertyFilter::from_flat(&["author", "ada"]).unwrap();
    /// assert_eq!(filter.pairs().len(), 1);
    ///
    /// assert!(PropertyFilter::from_flat(&["author"]).is_err());
    /// ```
    pub fn from_flat<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        if items.len() % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "property filter needs key/value pairs, got {} items",
                items.len()
            )));
        }
        Ok(Self::new(
            items
                .chunks_exact(2)
                .map(|kv| (kv[0].as_ref(), kv[1].as_ref())),
        ))
    }

    pub fn pairs(&self) -> &BTreeSet<(String, String)> {
        &self.pairs
    }

    fn contribution(&self) -> QueryContribution {
        if self.pairs.is_empty() {
            return QueryContribution::default();
        }
        QueryContribution {
            predicate: Some(Predicate::PropertyPairIn(
                self.pairs.iter().cloned().collect(),
            )),
            group_by: Some(GroupKey::Document),
            having_count_ge: self.pairs.len(),
        }
    }

    fn accuracy(&self, doc: &Document) -> usize {
        doc.properties().len().saturating_sub(self.pairs.len())
    }
}

/// Match on the filename, either exactly or as a case-insensitive substring.
///
/// In substring mode a `*` in the text is a wildcard and turns the search
/// into a whole-name pattern; without one the text may appear anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameFilter {
    text: String,
    exact_match: bool,
}

impl FilenameFilter {
    pub fn new(text: impl Into<String>, exact_match: bool) -> Self {
        Self {
            text: text.into(),
            exact_match,
        }
    }

    pub fn exact(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    pub fn containing(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    fn contribution(&self) -> QueryContribution {
        let predicate = if self.exact_match {
            Predicate::FilenameEquals(self.text.clone())
        } else {
            Predicate::FilenameGlob(filename_glob(&self.text))
        };
        QueryContribution {
            predicate: Some(predicate),
            ..QueryContribution::default()
        }
    }

    /// Length difference between the search text and the filename.
    fn accuracy(&self, doc: &Document) -> usize {
        if self.exact_match {
            return 0;
        }
        let text_len = self.text.chars().count();
        if doc.filename().is_empty() {
            return text_len;
        }
        text_len.abs_diff(doc.filename().chars().count())
    }
}

/// Translate search text into a glob. Runs of `*` become one wildcard and
/// every other glob metacharacter is matched literally.
fn filename_glob(text: &str) -> String {
    if !text.contains('*') {
        return format!("*{}*", globset::escape(text));
    }
    let mut glob = String::with_capacity(text.len() + 2);
    for (i, part) in text.split('*').enumerate() {
        if i > 0 && !glob.ends_with('*') {
            glob.push('*');
        }
        glob.push_str(&globset::escape(part));
    }
    glob
}

/// Match on the creation date, either a single day or an inclusive range.
///
/// A range match ranks below an exact date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Single(NaiveDate),
    Range { begin: NaiveDate, end: NaiveDate },
}

impl DateFilter {
    pub fn on(date: NaiveDate) -> Self {
        DateFilter::Single(date)
    }

    pub fn between(begin: NaiveDate, end: NaiveDate) -> Result<Self> {
        if begin > end {
            return Err(Error::InvalidArgument(format!(
                "date range starts after it ends: {begin} > {end}"
            )));
        }
        Ok(DateFilter::Range { begin, end })
    }

    /// Every day of `year`.
    pub fn year(year: i32) -> Result<Self> {
        let begin = ymd(year, 1, 1)?;
        let end = ymd(year, 12, 31)?;
        Self::between(begin, end)
    }

    /// Every day of `month` in `year`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use docman::filter::DateFilter;
    ///
    /// let feb = DateFilter::month(2024, 2).unwrap();
    /// assert_eq!(
    ///     feb,
    ///     DateFilter::Range {
    ///         begin: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
    ///         end: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
    ///     }
    /// );
    /// ```
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let begin = ymd(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = ymd(next_year, next_month, 1)?
            .pred_opt()
            .ok_or_else(|| {
                Error::InvalidArgument(format!("no last day for {year}-{month}"))
            })?;
        Self::between(begin, end)
    }

    pub fn day(year: i32, month: u32, day: u32) -> Result<Self> {
        Ok(Self::on(ymd(year, month, day)?))
    }

    pub fn today() -> Self {
        Self::on(Local::now().date_naive())
    }

    fn contribution(&self) -> QueryContribution {
        let predicate = match *self {
            DateFilter::Single(date) => Predicate::CreatedOn(date),
            DateFilter::Range { begin, end } => {
                Predicate::CreatedBetween(begin, end)
            }
        };
        QueryContribution {
            predicate: Some(predicate),
            ..QueryContribution::default()
        }
    }

    fn accuracy(&self) -> usize {
        match self {
            DateFilter::Single(_) => 0,
            DateFilter::Range { .. } => 1,
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "not a calendar date: {year:04}-{month:02}-{day:02}"
        ))
    })
}

/// Restrict results to documents directly inside `path`. Does not affect
/// ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFilter {
    path: String,
}

impl DirectoryFilter {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn contribution(&self) -> QueryContribution {
        QueryContribution {
            predicate: Some(Predicate::ParentPathEquals(self.path.clone())),
            ..QueryContribution::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Tag(TagFilter),
    Property(PropertyFilter),
    Filename(FilenameFilter),
    Date(DateFilter),
    Directory(DirectoryFilter),
}

impl Filter {
    pub fn contribution(&self) -> QueryContribution {
        match self {
            Filter::Tag(f) => f.contribution(),
            Filter::Property(f) => f.contribution(),
            Filter::Filename(f) => f.contribution(),
            Filter::Date(f) => f.contribution(),
            Filter::Directory(f) => f.contribution(),
        }
    }

    pub fn accuracy(&self, doc: &Document) -> usize {
        match self {
            Filter::Tag(f) => f.accuracy(doc),
            Filter::Property(f) => f.accuracy(doc),
            Filter::Filename(f) => f.accuracy(doc),
            Filter::Date(f) => f.accuracy(),
            Filter::Directory(_) => 0,
        }
    }
}

impl From<TagFilter> for Filter {
    fn from(f: TagFilter) -> Self {
        Filter::Tag(f)
    }
}

impl From<PropertyFilter> for Filter {
    fn from(f: PropertyFilter) -> Self {
        Filter::Property(f)
    }
}

impl From<FilenameFilter> for Filter {
    fn from(f: FilenameFilter) -> Self {
        Filter::Filename(f)
    }
}

impl From<DateFilter> for Filter {
    fn from(f: DateFilter) -> Self {
        Filter::Date(f)
    }
}

impl From<DirectoryFilter> for Filter {
    fn from(f: DirectoryFilter) -> Self {
        Filter::Directory(f)
    }
}

/// A set of filters that all have to hold.
///
/// # Examples
///
/// ```
/// use docman::filter::{DocumentFilter, FilenameFilter, TagFilter};
///
/// let filter = DocumentFilter::new()
///     .with(TagFilter::new(["t1", "t2"]))
///     .with(FilenameFilter::containing("report"));
///
/// let query = filter.to_query();
/// assert_eq!(query.predicates.len(), 2);
/// assert_eq!(query.having_count_ge, 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    filters: Vec<Filter>,
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl Into<Filter>) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: impl Into<Filter>) {
        self.filters.push(filter.into());
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// AND every predicate, merge group keys and add up required match counts.
    pub fn to_query(&self) -> Query {
        let mut query = Query::default();
        for filter in &self.filters {
            let c = filter.contribution();
            if let Some(predicate) = c.predicate {
                query.predicates.push(predicate);
            }
            if let Some(key) = c.group_by {
                if !query.group_by.contains(&key) {
                    query.group_by.push(key);
                }
            }
            query.having_count_ge += c.having_count_ge;
        }
        query
    }

    /// Sum of every filter's accuracy for `doc`.
    pub fn accuracy(&self, doc: &Document) -> usize {
        self.filters.iter().map(|f| f.accuracy(doc)).sum()
    }
}

impl FromIterator<Filter> for DocumentFilter {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}
