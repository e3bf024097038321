#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate discovers minimal functional dependencies, exact and
//! approximate, over the columns of a tabular dataset. It implements the
//! TANE algorithm described in this paper:
//!
//! - Huhtala, Kärkkäinen, Porkka, Toivonen, [TANE: An Efficient Algorithm
//!   for Discovering Functional and Approximate Dependencies][tane], 1999
//!
//! [tane]: https://doi.org/10.1093/comjnl/42.2.100
//!
//! A functional dependency X -> A holds when every pair of rows that agrees
//! on every column of X also agrees on A. It holds approximately with error
//! e when removing a fraction e of the rows would make it hold exactly.
//! TANE enumerates the lattice of attribute subsets level by level, by
//! increasing size. Each subset is represented by the partition of row
//! indices it induces, and the partition of a larger subset is the product
//! of two partitions computed one level earlier, so the raw table is
//! scanned only once, for the single attributes. Candidate right-hand
//! sides are inherited down the lattice by intersection, which keeps every
//! reported dependency left-reduced and prunes most of the search space.

pub use sorted_iter;

use lasso::{LargeSpur, MicroSpur, MiniSpur, Spur};
use smallvec::SmallVec;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::sorted_iterator::SortedByItem;
use sorted_iter::SortedIterator;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::iter;
use std::mem::{replace, take};
use std::num::NonZeroU32;

/// Types which can be used in an [`AttributeSet`].
pub trait AttributeId: Sized + Copy + std::hash::Hash + Ord {
    /// SmallVec contains two `usize` fields which overlap with the inline
    /// vector, so attribute sets will have minimum size if this array
    /// occupies the same number of bytes.
    ///
    /// It can be declared like this for any implementation, or you can have
    /// the [`attribute_id!`] macro do it for you.
    ///
    /// ```ignore
    /// use std::mem::size_of;
    /// type SmallArray = [Self; 2 * size_of::<usize>() / size_of::<Self>()];
    /// ```
    type SmallArray: smallvec::Array<Item = Self> + Clone + std::fmt::Debug + std::hash::Hash + Ord;
}

/// Generates implementations of the [`AttributeId`] trait which set the
/// associated `SmallArray` type to the biggest array that will fit within a
/// [`SmallVec`][smallvec::SmallVec]'s minimum size.
///
/// It also generates a test with the given `$testname` that checks that the
/// generated definition is as small as the smallest `SmallVec`.
///
/// For example, this library provides implementations for the basic unsigned
/// integer types using this declaration:
///
/// ```ignore
/// attribute_id![unsigned_id_size, u8, u16, u32, u64, usize];
/// ```
#[macro_export]
macro_rules! attribute_id {
    ($testname:ident, $($t:ty),*) => {
        $(
            impl $crate::AttributeId for $t {
                type SmallArray = [
                    Self;
                    2 * ::std::mem::size_of::<usize>() / ::std::mem::size_of::<Self>()
                ];
            }
        )*

        #[cfg(test)]
        #[test]
        fn $testname() {
            use $crate::AttributeSet;
            use smallvec::SmallVec;
            use std::mem::size_of;
            $(
                assert_eq!(
                    size_of::<AttributeSet<$t>>(),
                    size_of::<SmallVec<[(); 0]>>()
                );
            )*
        }
    };
}

attribute_id![lasso_id_size, LargeSpur, Spur, MiniSpur, MicroSpur];
attribute_id![unsigned_id_size, u8, u16, u32, u64, usize];
attribute_id![signed_id_size, i8, i16, i32, i64, isize];

/// A set of attributes, used as a lattice node key.
///
/// The representation is canonical (sorted and duplicate-free), so two sets
/// holding the same attributes compare equal no matter how they were built.
/// This implementation avoids heap allocations for sets containing a number
/// of attributes smaller than the length of [`AttributeId::SmallArray`].
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AttributeSet<A: AttributeId>(SmallVec<A::SmallArray>);

impl<A: AttributeId> AttributeSet<A> {
    /// Creates an attribute set containing the specified attributes.
    ///
    /// It's okay if the provided slice contains duplicates.
    pub fn new(ids: &[A]) -> Self {
        let mut v = SmallVec::from_slice(ids);
        v.sort_unstable();
        v.dedup();
        AttributeSet(v)
    }

    /// The number of attributes in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set contains no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the attributes which appear in this set.
    ///
    /// ```
    /// use fundep::AttributeSet;
    ///
    /// let abc = AttributeSet::new(&[2, 3, 1]);
    /// let mut it = abc.iter();
    /// assert_eq!(it.next(), Some(1));
    /// assert_eq!(it.next(), Some(2));
    /// assert_eq!(it.next(), Some(3));
    /// assert_eq!(it.next(), None);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = A> + SortedByItem + Clone + '_ {
        self.0.iter().copied().assume_sorted_by_item()
    }

    /// Returns `true` if the given attribute is a member of this set.
    pub fn contains(&self, attribute: A) -> bool {
        self.0.binary_search(&attribute).is_ok()
    }

    /// Returns `true` if `other` contains every attribute that `self` does.
    ///
    /// ```
    /// use fundep::AttributeSet;
    /// let nil = AttributeSet::new(&[]);
    /// let one = AttributeSet::new(&[1]);
    ///
    /// assert!(nil.is_subset(&one));
    /// assert!(nil.is_subset(&nil));
    /// assert!(one.is_subset(&one));
    /// assert!(!one.is_subset(&nil));
    /// ```
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().intersection(other.iter()).eq(self.iter())
    }

    /// Returns `true` if `self` contains every attribute that `other` does.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns a copy of this set without the given attribute.
    fn without(&self, attribute: A) -> Self {
        let mut v = SmallVec::with_capacity(self.len().saturating_sub(1));
        v.extend(self.0.iter().copied().filter(|id| *id != attribute));
        AttributeSet(v)
    }

    /// Returns a copy of this set with the given attribute added.
    fn with(&self, attribute: A) -> Self {
        let mut v = self.0.clone();
        if let Err(insert_at) = v.binary_search(&attribute) {
            v.insert(insert_at, attribute);
        }
        AttributeSet(v)
    }

    /// Returns an iterator over every subset of this attribute set that has
    /// one less attribute in it.
    fn remove_one_attribute(
        &self,
    ) -> impl DoubleEndedIterator<Item = Self> + ExactSizeIterator + iter::FusedIterator + '_ {
        // Working from the end backward produces the subsets in
        // lexicographic order.
        (0..self.len()).rev().map(move |remove_idx| {
            let mut selected = AttributeSet(SmallVec::with_capacity(self.len() - 1));
            selected.0.extend_from_slice(&self.0[..remove_idx]);
            selected.0.extend_from_slice(&self.0[remove_idx + 1..]);
            selected
        })
    }
}

impl<A: AttributeId + std::fmt::Debug> std::fmt::Debug for AttributeSet<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl<A: AttributeId> iter::FromIterator<A> for AttributeSet<A> {
    /// Creates an attribute set containing the specified attributes.
    ///
    /// It's okay if the provided iterator contains duplicates.
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut v = SmallVec::from_iter(iter);
        v.sort_unstable();
        v.dedup();
        AttributeSet(v)
    }
}

/// The ways in which constructing or filling a [`Table`] can fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TableError {
    /// The attribute list was out of order or contained a duplicate.
    UnorderedAttributes,
    /// A row did not carry exactly one value per attribute.
    RaggedRow {
        /// Index of the offending row.
        row: usize,
        /// Number of values the table's attribute list calls for.
        expected: usize,
        /// Number of values the row actually carried.
        found: usize,
    },
    /// Partitions store row indices as `u32`, which bounds the table size.
    TooManyRows,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::UnorderedAttributes => {
                write!(f, "attribute ids must be unique and strictly increasing")
            }
            TableError::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {} has {} values but the table has {} attributes",
                row, found, expected
            ),
            TableError::TooManyRows => write!(f, "tables are limited to 2^32 - 1 rows"),
        }
    }
}

impl std::error::Error for TableError {}

/// A rectangular table: an ordered list of attributes plus one column of
/// opaque value tokens per attribute.
///
/// Values only ever take part in equality comparisons, never in ordering or
/// arithmetic, matching the categorical semantics of functional
/// dependencies; numeric columns should be encoded as tokens that compare
/// equal exactly when the numbers do. Null handling is likewise a
/// tokenization decision for the layer that fills the table: map every null
/// to one shared token to make nulls equal to each other, or to fresh
/// unique tokens to make every null distinct.
#[derive(Clone)]
pub struct Table<A: AttributeId, T> {
    attributes: AttributeSet<A>,
    columns: Vec<Vec<T>>,
    row_count: usize,
}

impl<A: AttributeId, T> Table<A, T> {
    /// Creates an empty table over the given attributes.
    ///
    /// The attribute ids must be unique and strictly increasing; their order
    /// is the order in which [`Table::push_row`] expects row values.
    pub fn new(attributes: &[A]) -> Result<Self, TableError> {
        if attributes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(TableError::UnorderedAttributes);
        }
        Ok(Table {
            attributes: AttributeSet::new(attributes),
            columns: attributes.iter().map(|_| Vec::new()).collect(),
            row_count: 0,
        })
    }

    /// Appends one row of values, given in attribute order.
    ///
    /// Fails without modifying the table if the row does not carry exactly
    /// one value per attribute.
    ///
    /// ```
    /// use fundep::Table;
    ///
    /// let mut table = Table::new(&[0u8, 1]).unwrap();
    /// table.push_row(&["a", "x"]).unwrap();
    /// assert!(table.push_row(&["a"]).is_err());
    /// assert_eq!(table.row_count(), 1);
    /// ```
    pub fn push_row(&mut self, row: &[T]) -> Result<(), TableError>
    where
        T: Clone,
    {
        if row.len() != self.columns.len() {
            return Err(TableError::RaggedRow {
                row: self.row_count,
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        if self.row_count == u32::MAX as usize {
            return Err(TableError::TooManyRows);
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value.clone());
        }
        self.row_count += 1;
        Ok(())
    }

    /// The set of attributes this table has a column for.
    pub fn attributes(&self) -> &AttributeSet<A> {
        &self.attributes
    }

    /// The number of rows pushed so far.
    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

impl<A: AttributeId, T: Eq + Hash> Table<A, T> {
    /// Builds the stripped partition induced by a single attribute, scanning
    /// that attribute's column once.
    ///
    /// Returns `None` if the attribute has no column in this table.
    pub fn partition(&self, attribute: A) -> Option<StrippedPartition> {
        let index = self.attributes.0.binary_search(&attribute).ok()?;
        Some(StrippedPartition::from_column(&self.columns[index]))
    }
}

/// The partition of row indices induced by some attribute set: two rows
/// share an equivalence class exactly when they agree on every attribute of
/// the set.
///
/// The representation is stripped: classes holding a single row are
/// omitted, because they can never be split further. Real datasets tend
/// toward near-key attribute combinations whose classes are mostly
/// singletons, so stripping is the main memory reduction of the whole
/// search. The total row count and the number of covered rows are retained,
/// which keeps the exact class count and the error measure derivable.
#[derive(Clone, Debug)]
pub struct StrippedPartition {
    /// Non-singleton classes, each an ascending list of row indices.
    classes: Vec<Vec<u32>>,
    /// Total number of rows appearing in `classes`.
    covered: usize,
    row_count: usize,
}

impl StrippedPartition {
    /// Builds the partition of a single column by grouping row indices on
    /// equal values. Classes appear in order of first occurrence.
    ///
    /// ```
    /// use fundep::StrippedPartition;
    ///
    /// let partition = StrippedPartition::from_column(&["x", "y", "x", "z"]);
    /// assert_eq!(partition.class_count(), 3);
    /// assert!(!partition.is_key());
    /// ```
    pub fn from_column<T: Eq + Hash>(column: &[T]) -> Self {
        let mut by_value = HashMap::new();
        let mut classes: Vec<Vec<u32>> = Vec::new();
        for (row, value) in column.iter().enumerate() {
            let index = *by_value.entry(value).or_insert_with(|| {
                classes.push(Vec::new());
                classes.len() - 1
            });
            classes[index].push(row as u32);
        }
        classes.retain(|class| class.len() > 1);
        let covered = classes.iter().map(Vec::len).sum();
        StrippedPartition {
            classes,
            covered,
            row_count: column.len(),
        }
    }

    /// Computes the partition of the union of two attribute sets from the
    /// partitions of the parts: rows share a product class exactly when
    /// they share a class in both inputs.
    ///
    /// This is the stripped product of the TANE paper. Rows of `self` are
    /// tagged with their class, each class of `other` is split along those
    /// tags, and only groups of two or more rows survive. The cost is
    /// linear in the number of covered rows; the raw table is never
    /// consulted again, which is what makes the level-wise search
    /// affordable. Both partitions must be over the same table.
    ///
    /// ```
    /// use fundep::StrippedPartition;
    ///
    /// let left = StrippedPartition::from_column(&[1, 1, 2, 2]);
    /// let right = StrippedPartition::from_column(&["a", "b", "b", "b"]);
    /// // Only rows 2 and 3 agree in both inputs.
    /// assert_eq!(left.product(&right).class_count(), 3);
    /// ```
    pub fn product(&self, other: &StrippedPartition) -> StrippedPartition {
        debug_assert_eq!(self.row_count, other.row_count);

        // index+1 can't be zero, and stripped classes number at most half
        // the rows, so the tag always fits.
        let mut tags: Vec<Option<NonZeroU32>> = vec![None; self.row_count];
        for (index, class) in self.classes.iter().enumerate() {
            let tag = NonZeroU32::new(index as u32 + 1).unwrap();
            for &row in class {
                tags[row as usize] = Some(tag);
            }
        }

        let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); self.classes.len()];
        let mut touched = Vec::new();
        let mut classes = Vec::new();
        for class in other.classes.iter() {
            for &row in class {
                if let Some(tag) = tags[row as usize] {
                    let index = (tag.get() - 1) as usize;
                    if buckets[index].is_empty() {
                        touched.push(index);
                    }
                    buckets[index].push(row);
                }
            }
            for index in touched.drain(..) {
                if buckets[index].len() > 1 {
                    classes.push(take(&mut buckets[index]));
                } else {
                    // Keep the allocation around for the next class.
                    buckets[index].clear();
                }
            }
        }

        let covered = classes.iter().map(Vec::len).sum();
        StrippedPartition {
            classes,
            covered,
            row_count: self.row_count,
        }
    }

    /// The number of equivalence classes, counting the stripped singletons.
    pub fn class_count(&self) -> usize {
        self.classes.len() + (self.row_count - self.covered)
    }

    /// Returns `true` if every row is alone in its class, which makes the
    /// inducing attribute set a key. In stripped form that means no classes
    /// remain at all.
    pub fn is_key(&self) -> bool {
        self.classes.is_empty()
    }

    /// The number of rows of the underlying table.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// The minimum fraction of rows that would have to be removed for the
    /// attribute set of `refined` to depend on the attribute set of `self`.
    ///
    /// `refined` must be a refinement of `self`, typically the partition of
    /// the same attributes plus one more. For each class, every row outside
    /// the largest surviving sub-class counts toward the error; sub-classes
    /// are found through their representative row, and rows absent from the
    /// stripped refinement sit in sub-classes of size one.
    ///
    /// A partition over zero rows yields 0.0 rather than dividing by zero.
    ///
    /// ```
    /// use fundep::StrippedPartition;
    ///
    /// let lhs = StrippedPartition::from_column(&["x", "x", "y"]);
    /// let refined = StrippedPartition::from_column(&["p", "q", "p"]);
    /// let both = lhs.product(&refined);
    /// // One of the two x-rows has to go.
    /// assert!((lhs.error(&both) - 1.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn error(&self, refined: &StrippedPartition) -> f64 {
        if self.row_count == 0 {
            return 0.0;
        }
        let mut sub_class_sizes = HashMap::with_capacity(refined.classes.len());
        for class in refined.classes.iter() {
            sub_class_sizes.insert(class[0], class.len());
        }
        let mut removed = 0;
        for class in self.classes.iter() {
            let mut keep = 1;
            for &row in class {
                if let Some(&size) = sub_class_sizes.get(&row) {
                    keep = keep.max(size);
                }
            }
            removed += class.len() - keep;
        }
        removed as f64 / self.row_count as f64
    }
}

/// Options recognized by the dependency search.
#[derive(Clone, Debug)]
pub struct Config<A: AttributeId> {
    /// The largest tolerated error for an approximate dependency. The
    /// default of 0 restricts discovery to exact dependencies; the error
    /// measure is then never evaluated.
    pub epsilon: f64,
    /// Hard cap on the lattice level explored. The search space is
    /// exponential in the number of attributes, so wide tables need a cap
    /// to stay tractable. Hitting it marks the report truncated.
    pub max_level: Option<usize>,
    /// Cap on the total number of lattice nodes generated, checked between
    /// levels. Exceeding it marks the report truncated.
    pub max_nodes: Option<usize>,
    /// Attributes left out of the search universe entirely: they appear in
    /// no left-hand side and no right-hand side.
    pub excluded: AttributeSet<A>,
}

impl<A: AttributeId> Default for Config<A> {
    fn default() -> Self {
        Config {
            epsilon: 0.0,
            max_level: None,
            max_nodes: None,
            excluded: AttributeSet::new(&[]),
        }
    }
}

/// One discovered minimal functional dependency.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependency<A: AttributeId> {
    /// The determining attribute set. It never contains `rhs`, and no
    /// proper subset of it determines `rhs` under the same tolerance.
    pub lhs: AttributeSet<A>,
    /// The determined attribute.
    pub rhs: A,
    /// Whether the dependency holds on every row.
    pub exact: bool,
    /// The fraction of rows whose removal would make the dependency hold
    /// exactly. Always 0 when `exact` is set, and never above the
    /// configured epsilon otherwise.
    pub error: f64,
}

/// Accumulates dependencies as the search finds them.
///
/// The accumulator is an explicit value threaded through the search rather
/// than ambient shared state, so several tables or configurations can be
/// mined in the same process without interference. It deduplicates on the
/// (lhs, rhs) pair, keeping the strongest registration.
pub struct DependencyCollector<A: AttributeId> {
    found: HashMap<(AttributeSet<A>, A), f64>,
    truncated: bool,
}

impl<A: AttributeId> DependencyCollector<A> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        DependencyCollector {
            found: HashMap::new(),
            truncated: false,
        }
    }

    /// Registers a dependency with the given error, 0 meaning exact.
    ///
    /// Registering the same (lhs, rhs) pair again keeps whichever
    /// registration has the smaller error, so an exact finding always wins
    /// over an approximate one.
    ///
    /// ```
    /// use fundep::{AttributeSet, DependencyCollector};
    ///
    /// let mut collector = DependencyCollector::new();
    /// collector.record(AttributeSet::new(&[1u8]), 2, 0.25);
    /// collector.record(AttributeSet::new(&[1u8]), 2, 0.0);
    /// let report = collector.into_report();
    /// assert_eq!(report.len(), 1);
    /// assert!(report.iter().next().unwrap().exact);
    /// ```
    pub fn record(&mut self, lhs: AttributeSet<A>, rhs: A, error: f64) {
        let slot = self.found.entry((lhs, rhs)).or_insert(error);
        if error < *slot {
            *slot = error;
        }
    }

    /// The number of distinct dependencies registered so far.
    pub fn len(&self) -> usize {
        self.found.len()
    }

    /// Returns `true` if nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// Marks the eventual report as cut short by a configured limit.
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Finalizes into a report, sorted by left-hand-side size, then
    /// left-hand side, then right-hand side, for deterministic output.
    pub fn into_report(self) -> DependencyReport<A> {
        let mut dependencies: Vec<Dependency<A>> = self
            .found
            .into_iter()
            .map(|((lhs, rhs), error)| Dependency {
                lhs,
                rhs,
                exact: error == 0.0,
                error,
            })
            .collect();
        dependencies.sort_unstable_by(|a, b| {
            a.lhs
                .len()
                .cmp(&b.lhs.len())
                .then_with(|| a.lhs.cmp(&b.lhs))
                .then_with(|| a.rhs.cmp(&b.rhs))
        });
        DependencyReport {
            dependencies,
            truncated: self.truncated,
        }
    }
}

impl<A: AttributeId> Default for DependencyCollector<A> {
    fn default() -> Self {
        DependencyCollector::new()
    }
}

/// The finished outcome of a dependency search.
#[derive(Clone, Debug, PartialEq)]
pub struct DependencyReport<A: AttributeId> {
    dependencies: Vec<Dependency<A>>,
    truncated: bool,
}

impl<A: AttributeId> DependencyReport<A> {
    /// Returns an iterator over the discovered dependencies, ordered by
    /// left-hand-side size, then left-hand side, then right-hand side.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Dependency<A>> + '_ {
        self.dependencies.iter()
    }

    /// The number of discovered dependencies.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Returns `true` if no dependency was discovered. That is a successful
    /// outcome, not a failure.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Returns `true` if the search stopped at a configured cutoff before
    /// exhausting the lattice, so dependencies may exist beyond the ones
    /// reported.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// The candidate right-hand sides still plausible at each lattice node.
///
/// An attribute survives as a candidate at a node only if it survived at
/// every one of the node's one-smaller subsets, so a missing entry defaults
/// to the intersection over those subsets, computed on demand and memoized.
/// Entries are replaced wholesale, never aliased, so shrinking one node's
/// set cannot disturb another node that inherited from the same parent.
struct CandidateSets<A: AttributeId> {
    sets: HashMap<AttributeSet<A>, AttributeSet<A>>,
}

impl<A: AttributeId> CandidateSets<A> {
    fn new(universe: AttributeSet<A>) -> Self {
        let mut sets = HashMap::new();
        sets.insert(AttributeSet::new(&[]), universe);
        CandidateSets { sets }
    }

    fn of(&mut self, set: &AttributeSet<A>) -> AttributeSet<A> {
        if let Some(candidates) = self.sets.get(set) {
            return candidates.clone();
        }
        let mut subsets = set.remove_one_attribute();
        let mut candidates = match subsets.next() {
            Some(first) => self.of(&first),
            // The empty set is seeded at construction, so this set has at
            // least one attribute and therefore at least one subset.
            None => unreachable!(),
        };
        for subset in subsets {
            let inherited = self.of(&subset);
            candidates = candidates.iter().intersection(inherited.iter()).collect();
        }
        self.sets.insert(set.clone(), candidates.clone());
        candidates
    }

    fn replace(&mut self, set: &AttributeSet<A>, candidates: AttributeSet<A>) {
        self.sets.insert(set.clone(), candidates);
    }
}

/// One lattice level: nodes keyed by attribute set, sorted so that sets
/// sharing a prefix sit next to each other, paired with their partitions.
type Level<A> = Vec<(AttributeSet<A>, StrippedPartition)>;

fn find_partition<'level, A: AttributeId>(
    level: &'level Level<A>,
    set: &AttributeSet<A>,
) -> Option<&'level StrippedPartition> {
    level
        .binary_search_by(|entry| entry.0.cmp(set))
        .ok()
        .map(|index| &level[index].1)
}

fn level_contains<A: AttributeId>(level: &Level<A>, set: &AttributeSet<A>) -> bool {
    level.binary_search_by(|entry| entry.0.cmp(set)).is_ok()
}

/// Joins pairs of level-L nodes into the level-(L+1) candidate sets,
/// without computing any partitions yet.
///
/// Two nodes join when they share their first L-1 attributes and differ in
/// the last. The union must also pass the subset-closure check: every one
/// of its size-L subsets is still a live node. A pruned subset means the
/// union can contribute no further minimal dependency, so it is never
/// generated.
fn next_level_sets<A: AttributeId>(level: &Level<A>) -> Vec<(usize, usize, AttributeSet<A>)> {
    let mut joins = Vec::new();
    let mut block_start = 0;
    for index in 0..=level.len() {
        let block_ended = index == level.len() || {
            let head = &level[block_start].0;
            let this = &level[index].0;
            head.0[..head.len() - 1] != this.0[..this.len() - 1]
        };
        if !block_ended {
            continue;
        }
        for left in block_start..index {
            for right in left + 1..index {
                // The level is sorted, so the right node's last attribute
                // is the larger one and pushing it keeps the union sorted.
                let last = level[right].0 .0[level[right].0.len() - 1];
                let mut union = level[left].0.clone();
                union.0.push(last);
                if union
                    .remove_one_attribute()
                    .all(|subset| level_contains(level, &subset))
                {
                    joins.push((left, right, union));
                }
            }
        }
        block_start = index;
    }
    joins
}

/// Computes the partition for every joined candidate as the product of its
/// two parents' partitions.
fn materialize<A: AttributeId>(
    level: &Level<A>,
    joins: Vec<(usize, usize, AttributeSet<A>)>,
) -> Level<A> {
    let next: Level<A> = joins
        .into_iter()
        .map(|(left, right, union)| {
            let partition = level[left].1.product(&level[right].1);
            (union, partition)
        })
        .collect();
    // Prefix joins emit unions in lexicographic order, which the binary
    // searches over the level rely on.
    debug_assert!(next.windows(2).all(|pair| pair[0].0 < pair[1].0));
    next
}

/// Drops nodes that can yield no further minimal dependency: nodes whose
/// candidate set has emptied, and key nodes, which first report a
/// dependency to every remaining candidate attribute outside the node.
///
/// The guard on key nodes keeps those reports minimal: X -> A is only
/// reported while A is still a candidate of every set obtained by swapping
/// one member of X for A.
fn prune<A: AttributeId>(
    current: &mut Level<A>,
    candidates: &mut CandidateSets<A>,
    collector: &mut DependencyCollector<A>,
) {
    let mut keep = Vec::with_capacity(current.len());
    for (set, partition) in current.drain(..) {
        let remaining = candidates.of(&set);
        if remaining.is_empty() {
            continue;
        }
        if partition.is_key() {
            for rhs in remaining.iter().difference(set.iter()) {
                let minimal = set.iter().all(|member| {
                    let witness = set.without(member).with(rhs);
                    candidates.of(&witness).contains(rhs)
                });
                if minimal {
                    collector.record(set.clone(), rhs, 0.0);
                }
            }
            continue;
        }
        keep.push((set, partition));
    }
    *current = keep;
}

/// A configured dependency search over one table.
///
/// The search borrows the table, holds no other state between runs, and can
/// be rerun or dropped freely.
pub struct Tane<'a, A: AttributeId, T> {
    table: &'a Table<A, T>,
    config: Config<A>,
}

impl<'a, A: AttributeId, T> Tane<'a, A, T> {
    /// Prepares a search for exact dependencies with no cutoffs.
    pub fn new(table: &'a Table<A, T>) -> Self {
        Tane::with_config(table, Config::default())
    }

    /// Prepares a search with the given options.
    ///
    /// # Panics
    ///
    /// This method panics if `config.epsilon` is negative or not finite.
    pub fn with_config(table: &'a Table<A, T>, config: Config<A>) -> Self {
        assert!(config.epsilon >= 0.0 && config.epsilon.is_finite());
        Tane { table, config }
    }
}

impl<'a, A: AttributeId, T: Eq + Hash> Tane<'a, A, T> {
    /// Runs the level-wise search and returns the minimal dependencies.
    ///
    /// Level 1 holds one node per attribute with its partition built from
    /// the table; every later level is generated by prefix joins and
    /// partition products. Each level is validated, then pruned, then
    /// joined into the next, and a level's partitions are dropped as soon
    /// as the level after them has been generated. A table with no rows
    /// short-circuits to an empty report.
    ///
    /// ```
    /// use fundep::{Table, Tane};
    ///
    /// let mut table = Table::new(&[0u8, 1, 2]).unwrap();
    /// table.push_row(&["1", "x", "p"]).unwrap();
    /// table.push_row(&["1", "x", "q"]).unwrap();
    /// table.push_row(&["2", "y", "p"]).unwrap();
    ///
    /// let report = Tane::new(&table).run();
    /// let found: Vec<_> = report
    ///     .iter()
    ///     .map(|dep| (dep.lhs.iter().collect::<Vec<_>>(), dep.rhs))
    ///     .collect();
    /// // Attribute 0 determines attribute 1 and the other way around;
    /// // nothing else holds exactly.
    /// assert_eq!(found, vec![(vec![0], 1), (vec![1], 0)]);
    /// ```
    pub fn run(&self) -> DependencyReport<A> {
        let mut collector = DependencyCollector::new();
        let universe: AttributeSet<A> = self
            .table
            .attributes()
            .iter()
            .difference(self.config.excluded.iter())
            .collect();
        if self.table.row_count() == 0 || universe.is_empty() {
            return collector.into_report();
        }

        let mut candidates = CandidateSets::new(universe.clone());
        let mut previous: Level<A> = Vec::new();
        let mut current: Level<A> = universe
            .iter()
            .map(|attribute| {
                // The universe is a subset of the table's attributes, so
                // every column lookup succeeds.
                let partition = self.table.partition(attribute).unwrap();
                (AttributeSet::new(&[attribute]), partition)
            })
            .collect();
        let mut generated = current.len();
        let mut level = 1;

        loop {
            self.compute_dependencies(&current, &previous, &mut candidates, &mut collector);
            prune(&mut current, &mut candidates, &mut collector);
            log::debug!(
                "level {}: {} nodes after pruning, {} dependencies so far",
                level,
                current.len(),
                collector.len()
            );
            if current.is_empty() {
                break;
            }
            if self.config.max_level.map_or(false, |cap| level >= cap) {
                if !next_level_sets(&current).is_empty() {
                    collector.mark_truncated();
                }
                break;
            }
            let joins = next_level_sets(&current);
            if joins.is_empty() {
                break;
            }
            if self
                .config
                .max_nodes
                .map_or(false, |cap| generated + joins.len() > cap)
            {
                collector.mark_truncated();
                break;
            }
            log::trace!(
                "level {}: joining into {} candidates",
                level + 1,
                joins.len()
            );
            let next = materialize(&current, joins);
            generated += next.len();
            // The older level's partitions served their last purpose as
            // join inputs; dropping `previous` releases them here.
            previous = replace(&mut current, next);
            level += 1;
        }

        collector.into_report()
    }

    /// Validates each node's plausible right-hand sides against the level
    /// below, registering exact dependencies and, when epsilon allows,
    /// approximate ones.
    fn compute_dependencies(
        &self,
        current: &Level<A>,
        previous: &Level<A>,
        candidates: &mut CandidateSets<A>,
        collector: &mut DependencyCollector<A>,
    ) {
        for (set, partition) in current.iter() {
            let inherited = candidates.of(set);
            let testable: AttributeSet<A> = inherited.iter().intersection(set.iter()).collect();
            if testable.is_empty() {
                continue;
            }
            let mut remaining = inherited;
            for rhs in testable.iter() {
                let lhs = set.without(rhs);
                if lhs.is_empty() {
                    // A dependency with an empty left-hand side would say
                    // the column is constant; those are not mined.
                    continue;
                }
                // Every proper subset of a generated node was live one
                // level down when the node was joined, so the lookup
                // cannot fail.
                let lhs_partition = find_partition(previous, &lhs).unwrap();
                if lhs_partition.class_count() == partition.class_count() {
                    collector.record(lhs, rhs, 0.0);
                    // An exact dependency makes every attribute outside
                    // the node redundant as a right-hand side anywhere
                    // above it.
                    remaining = remaining
                        .iter()
                        .intersection(set.iter())
                        .collect::<AttributeSet<A>>()
                        .without(rhs);
                } else if self.config.epsilon > 0.0 {
                    let error = lhs_partition.error(partition);
                    if error <= self.config.epsilon {
                        collector.record(lhs, rhs, error);
                        remaining = remaining.without(rhs);
                    }
                }
            }
            candidates.replace(set, remaining);
        }
    }
}
