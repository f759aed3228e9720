//! Null-safe predicate composition for search endpoints.
//!
//! A [`Predicate`] is either *open* (no constraint) or a test function. Every
//! primitive returns an open predicate when its input is unset: `None` or a
//! blank string, the `-1` sentinel for ranges and flags. Open predicates are
//! the identity of [`Predicate::and`], so a search built from an empty filter
//! matches exactly what an unfiltered scan would.
//!
//! ```
//! use common::Predicate;
//!
//! struct Product { name: String, price_cents: i64 }
//!
//! let filter = Predicate::<Product>::always()
//!     .and(Predicate::contains(|p: &Product| p.name.as_str(), Some("desk")))
//!     .and(Predicate::at_least(|p: &Product| p.price_cents, -1));
//!
//! let desk = Product { name: "Standing Desk".into(), price_cents: 25_000 };
//! assert!(filter.matches(&desk));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Errors raised while turning raw filter input into a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// A date filter was not a calendar date.
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// A tri-state flag was outside `{-1, 0, 1}`.
    #[error("Invalid flag {0}: expected -1, 0 or 1")]
    InvalidFlag(i32),
}

/// Numeric bound types with an "unset" marker.
///
/// The marker is `-1`: callers send it to mean "not specified", which is
/// different from a real boundary of zero.
pub trait Sentinel: PartialOrd + Copy + Send + Sync + 'static {
    /// Returns true if this value is the "no constraint" marker.
    fn is_unset(&self) -> bool;
}

impl Sentinel for i64 {
    fn is_unset(&self) -> bool {
        *self == -1
    }
}

impl Sentinel for i32 {
    fn is_unset(&self) -> bool {
        *self == -1
    }
}

/// A boolean filter that may be left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// No constraint (`-1`).
    #[default]
    Any,
    /// Field must be false (`0`).
    No,
    /// Field must be true (`1`).
    Yes,
}

impl TryFrom<i32> for TriState {
    type Error = PredicateError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(TriState::Any),
            0 => Ok(TriState::No),
            1 => Ok(TriState::Yes),
            other => Err(PredicateError::InvalidFlag(other)),
        }
    }
}

type Test<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A composable filter over `T`, or no filter at all.
pub struct Predicate<T> {
    test: Option<Test<T>>,
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: self.test.clone(),
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.test {
            Some(_) => f.write_str("Predicate(constrained)"),
            None => f.write_str("Predicate(open)"),
        }
    }
}

impl<T: 'static> Default for Predicate<T> {
    fn default() -> Self {
        Self::always()
    }
}

impl<T: 'static> Predicate<T> {
    /// The open predicate: matches everything.
    pub fn always() -> Self {
        Self { test: None }
    }

    /// Wraps an arbitrary test.
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Some(Arc::new(test)),
        }
    }

    /// Returns true if this predicate places no constraint.
    pub fn is_open(&self) -> bool {
        self.test.is_none()
    }

    /// Logical AND. An open side is dropped rather than evaluated.
    pub fn and(self, other: Self) -> Self {
        match (self.test, other.test) {
            (Some(left), Some(right)) => Self::new(move |item: &T| left(item) && right(item)),
            (Some(test), None) | (None, Some(test)) => Self { test: Some(test) },
            (None, None) => Self::always(),
        }
    }

    /// AND of all predicates; open when the iterator is empty.
    pub fn all(predicates: impl IntoIterator<Item = Self>) -> Self {
        predicates.into_iter().fold(Self::always(), Self::and)
    }

    /// Evaluates the predicate against one item.
    pub fn matches(&self, item: &T) -> bool {
        self.test.as_ref().is_none_or(|test| test(item))
    }

    /// Keeps the items that match, preserving their order.
    pub fn select<I>(&self, items: I) -> Vec<I::Item>
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        items
            .into_iter()
            .filter(|item| self.matches(item.borrow()))
            .collect()
    }

    /// Case-insensitive "contains" on a string field.
    ///
    /// Open when `value` is `None` or blank.
    pub fn contains<F>(field: F, value: Option<&str>) -> Self
    where
        F: Fn(&T) -> &str + Send + Sync + 'static,
    {
        match needle(value) {
            Some(needle) => Self::new(move |item| field(item).to_lowercase().contains(&needle)),
            None => Self::always(),
        }
    }

    /// Case-insensitive "contains" across a to-one or to-many relation.
    ///
    /// Matches when any related element's field contains `value`. A to-one
    /// relation is expressed with `Option::as_slice`.
    pub fn joined_contains<J, F, G>(join: F, field: G, value: Option<&str>) -> Self
    where
        J: 'static,
        F: Fn(&T) -> &[J] + Send + Sync + 'static,
        G: Fn(&J) -> &str + Send + Sync + 'static,
    {
        match needle(value) {
            Some(needle) => Self::new(move |item| {
                join(item)
                    .iter()
                    .any(|related| field(related).to_lowercase().contains(&needle))
            }),
            None => Self::always(),
        }
    }

    /// Exact match on a field. Open when `value` is `None`.
    pub fn equals<V, F>(field: F, value: Option<V>) -> Self
    where
        V: PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        match value {
            Some(expected) => Self::new(move |item| field(item) == expected),
            None => Self::always(),
        }
    }

    /// `field >= bound`, open when `bound` is the `-1` sentinel.
    pub fn at_least<V, F>(field: F, bound: V) -> Self
    where
        V: Sentinel,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        if bound.is_unset() {
            return Self::always();
        }
        Self::new(move |item| field(item) >= bound)
    }

    /// `field <= bound`, open when `bound` is the `-1` sentinel.
    pub fn at_most<V, F>(field: F, bound: V) -> Self
    where
        V: Sentinel,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        if bound.is_unset() {
            return Self::always();
        }
        Self::new(move |item| field(item) <= bound)
    }

    /// Timestamp on or after the start of the given `YYYY-MM-DD` day (UTC).
    pub fn on_or_after<F>(field: F, iso_date: Option<&str>) -> Result<Self, PredicateError>
    where
        F: Fn(&T) -> DateTime<Utc> + Send + Sync + 'static,
    {
        let Some(date) = parse_date(iso_date)? else {
            return Ok(Self::always());
        };
        let start = date.and_time(NaiveTime::MIN).and_utc();
        Ok(Self::new(move |item| field(item) >= start))
    }

    /// Timestamp on or before the end of the given `YYYY-MM-DD` day (UTC).
    pub fn on_or_before<F>(field: F, iso_date: Option<&str>) -> Result<Self, PredicateError>
    where
        F: Fn(&T) -> DateTime<Utc> + Send + Sync + 'static,
    {
        let Some(date) = parse_date(iso_date)? else {
            return Ok(Self::always());
        };
        // Upper bound is exclusive at the next midnight.
        let Some(next_day) = date.succ_opt() else {
            return Ok(Self::always());
        };
        let end = next_day.and_time(NaiveTime::MIN).and_utc();
        Ok(Self::new(move |item| field(item) < end))
    }

    /// Boolean field filter driven by a tri-state.
    pub fn flag<F>(field: F, state: TriState) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        match state {
            TriState::Any => Self::always(),
            TriState::Yes => Self::new(field),
            TriState::No => Self::new(move |item| !field(item)),
        }
    }

    /// Boolean field filter from the raw `{-1, 0, 1}` encoding.
    pub fn boolean_flag<F>(field: F, flag: i32) -> Result<Self, PredicateError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Ok(Self::flag(field, TriState::try_from(flag)?))
    }
}

fn needle(value: Option<&str>) -> Option<String> {
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(str::to_lowercase)
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, PredicateError> {
    match value.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| PredicateError::InvalidDate {
                value: raw.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        label: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
        price: i64,
        active: bool,
        created_at: DateTime<Utc>,
        tags: Vec<Tag>,
        category: Option<Tag>,
    }

    fn item(name: &str, price: i64, active: bool, day: u32, tags: &[&str]) -> Item {
        Item {
            name: name.to_string(),
            price,
            active,
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 30, 0).unwrap(),
            tags: tags
                .iter()
                .map(|t| Tag {
                    label: t.to_string(),
                })
                .collect(),
            category: None,
        }
    }

    fn catalog() -> Vec<Item> {
        vec![
            item("Oak Desk", 25_000, true, 1, &["furniture", "wood"]),
            item("Desk Lamp", 4_500, true, 2, &["lighting"]),
            item("Office Chair", 0, false, 3, &["furniture"]),
        ]
    }

    #[test]
    fn empty_filters_are_identity() {
        let predicate = Predicate::<Item>::all([
            Predicate::contains(|i: &Item| i.name.as_str(), None),
            Predicate::contains(|i: &Item| i.name.as_str(), Some("   ")),
            Predicate::at_least(|i: &Item| i.price, -1),
            Predicate::at_most(|i: &Item| i.price, -1),
            Predicate::boolean_flag(|i: &Item| i.active, -1).unwrap(),
            Predicate::on_or_after(|i: &Item| i.created_at, None).unwrap(),
            Predicate::on_or_before(|i: &Item| i.created_at, Some("")).unwrap(),
            Predicate::joined_contains(
                |i: &Item| i.tags.as_slice(),
                |t: &Tag| t.label.as_str(),
                None,
            ),
        ]);

        assert!(predicate.is_open());
        assert_eq!(predicate.select(catalog()), catalog());
    }

    #[test]
    fn lower_bound_zero_is_a_real_bound() {
        let unset = Predicate::<Item>::at_least(|i: &Item| i.price, -1);
        let zero = Predicate::<Item>::at_least(|i: &Item| i.price, 0);
        let one = Predicate::<Item>::at_least(|i: &Item| i.price, 1);

        assert_eq!(unset.select(catalog()).len(), 3);
        assert_eq!(zero.select(catalog()).len(), 3);
        assert_eq!(one.select(catalog()).len(), 2);
    }

    #[test]
    fn contains_is_case_insensitive() {
        let predicate = Predicate::<Item>::contains(|i: &Item| i.name.as_str(), Some("DESK"));
        let names: Vec<_> = predicate
            .select(catalog())
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Oak Desk", "Desk Lamp"]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let predicate = Predicate::<Item>::at_least(|i: &Item| i.price, 4_500)
            .and(Predicate::at_most(|i: &Item| i.price, 25_000));
        assert_eq!(predicate.select(catalog()).len(), 2);
    }

    #[test]
    fn date_filters_expand_to_whole_days() {
        let from =
            Predicate::<Item>::on_or_after(|i: &Item| i.created_at, Some("2024-03-02")).unwrap();
        let to =
            Predicate::<Item>::on_or_before(|i: &Item| i.created_at, Some("2024-03-02")).unwrap();
        let same_day = from.and(to);

        let names: Vec<_> = same_day
            .select(catalog())
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Desk Lamp"]);
    }

    #[test]
    fn end_of_day_is_included() {
        let mut late = item("Late", 1, true, 5, &[]);
        late.created_at = Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap();

        let predicate =
            Predicate::<Item>::on_or_before(|i: &Item| i.created_at, Some("2024-03-05")).unwrap();
        assert!(predicate.matches(&late));

        let predicate =
            Predicate::<Item>::on_or_before(|i: &Item| i.created_at, Some("2024-03-04")).unwrap();
        assert!(!predicate.matches(&late));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let result = Predicate::<Item>::on_or_after(|i: &Item| i.created_at, Some("03/02/2024"));
        assert_eq!(
            result.unwrap_err(),
            PredicateError::InvalidDate {
                value: "03/02/2024".to_string()
            }
        );
    }

    #[test]
    fn boolean_flag_maps_tri_state() {
        let active = Predicate::<Item>::boolean_flag(|i: &Item| i.active, 1).unwrap();
        let inactive = Predicate::<Item>::boolean_flag(|i: &Item| i.active, 0).unwrap();

        assert_eq!(active.select(catalog()).len(), 2);
        assert_eq!(inactive.select(catalog()).len(), 1);
        assert_eq!(
            Predicate::<Item>::boolean_flag(|i: &Item| i.active, 2).unwrap_err(),
            PredicateError::InvalidFlag(2)
        );
    }

    #[test]
    fn joined_contains_matches_any_related_element() {
        let predicate = Predicate::<Item>::joined_contains(
            |i: &Item| i.tags.as_slice(),
            |t: &Tag| t.label.as_str(),
            Some("furn"),
        );
        assert_eq!(predicate.select(catalog()).len(), 2);
    }

    #[test]
    fn joined_contains_over_to_one_relation() {
        let mut with_category = item("Rug", 100, true, 4, &[]);
        with_category.category = Some(Tag {
            label: "Textiles".to_string(),
        });
        let without_category = item("Vase", 100, true, 4, &[]);

        let predicate = Predicate::<Item>::joined_contains(
            |i: &Item| i.category.as_slice(),
            |t: &Tag| t.label.as_str(),
            Some("textile"),
        );
        assert!(predicate.matches(&with_category));
        assert!(!predicate.matches(&without_category));
    }

    #[test]
    fn composition_order_does_not_change_results() {
        let by_name = || Predicate::<Item>::contains(|i: &Item| i.name.as_str(), Some("desk"));
        let by_price = || Predicate::<Item>::at_most(|i: &Item| i.price, 10_000);

        let left = by_name().and(by_price());
        let right = by_price().and(by_name());
        assert_eq!(left.select(catalog()), right.select(catalog()));
    }

    #[test]
    fn equals_ignores_none() {
        let open = Predicate::<Item>::equals(|i: &Item| i.active, None);
        let inactive = Predicate::<Item>::equals(|i: &Item| i.active, Some(false));
        assert!(open.is_open());
        assert_eq!(inactive.select(catalog()).len(), 1);
    }
}
