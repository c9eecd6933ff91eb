//! Filter compiler for conference queries.
//!
//! Clients send an ordered list of `(field, operator, value)` string triples.
//! [`compile`] validates every token against a closed allow-list, coerces
//! values for numeric fields, enforces the single-inequality-field rule and
//! produces a [`QueryPlan`]: a conjunction of typed predicates plus the sort
//! order a query over the conference set must use.
//!
//! A plan is storage-neutral. [`QueryPlan::apply`] evaluates it over
//! in-memory conferences; SQL backends translate the same predicates and
//! order into their own query language.
//!
//! # Example
//!
//! ```
//! use conference_core::filter::{compile, ConferenceField, FilterSpec};
//!
//! let plan = compile(&[
//!     FilterSpec::new("MAX_ATTENDEES", "GT", "10"),
//!     FilterSpec::new("CITY", "EQ", "Paris"),
//! ])
//! .unwrap();
//!
//! assert_eq!(plan.order(), &[ConferenceField::MaxAttendees, ConferenceField::Name]);
//! ```

use crate::model::Conference;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors produced while compiling a filter list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Field or operator token outside the allow-list.
    #[error("Filter contains invalid field or operator.")]
    InvalidToken {
        /// Field token as received.
        field: String,
        /// Operator token as received.
        operator: String,
    },

    /// A numeric field received a value that is not an integer.
    #[error("Filter value '{value}' is not a valid integer for {field}.")]
    InvalidValue {
        /// Field token the value belongs to.
        field: &'static str,
        /// Value as received.
        value: String,
    },

    /// Inequality operators were used on more than one field.
    #[error("Inequality filter is allowed on only one field.")]
    MultipleInequalityFields,
}

/// One filter triple exactly as a client sent it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Logical field token (`CITY`, `TOPIC`, `MONTH`, `MAX_ATTENDEES`).
    pub field: String,
    /// Operator token (`EQ`, `GT`, `GTEQ`, `LT`, `LTEQ`, `NE`).
    pub operator: String,
    /// Comparison value.
    pub value: String,
}

impl FilterSpec {
    /// Convenience constructor.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A conference attribute a predicate or sort key can refer to.
///
/// Only `City`, `Topic`, `Month` and `MaxAttendees` are reachable from
/// client filters. `SeatsAvailable` and `Name` are used by internal plans.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConferenceField {
    /// `city`, text.
    City,
    /// `topics`, list of text; a predicate holds when any topic satisfies it.
    Topic,
    /// `month`, integer.
    Month,
    /// `maxAttendees`, integer.
    MaxAttendees,
    /// `seatsAvailable`, integer.
    SeatsAvailable,
    /// `name`, text.
    Name,
}

impl ConferenceField {
    /// Resolve a client field token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "CITY" => Some(Self::City),
            "TOPIC" => Some(Self::Topic),
            "MONTH" => Some(Self::Month),
            "MAX_ATTENDEES" => Some(Self::MaxAttendees),
            _ => None,
        }
    }

    /// Client-facing token for the field.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::City => "CITY",
            Self::Topic => "TOPIC",
            Self::Month => "MONTH",
            Self::MaxAttendees => "MAX_ATTENDEES",
            Self::SeatsAvailable => "SEATS_AVAILABLE",
            Self::Name => "NAME",
        }
    }

    /// Whether values for this field are integers.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Month | Self::MaxAttendees | Self::SeatsAvailable)
    }

    fn read(self, conference: &Conference) -> FieldRef<'_> {
        match self {
            Self::City => FieldRef::Text(&conference.city),
            Self::Topic => FieldRef::List(&conference.topics),
            Self::Month => FieldRef::Integer(i64::from(conference.month)),
            Self::MaxAttendees => FieldRef::Integer(conference.max_attendees),
            Self::SeatsAvailable => FieldRef::Integer(conference.seats_available),
            Self::Name => FieldRef::Text(&conference.name),
        }
    }

    fn compare(self, a: &Conference, b: &Conference) -> Ordering {
        match (self.read(a), self.read(b)) {
            (FieldRef::Text(x), FieldRef::Text(y)) => x.cmp(y),
            (FieldRef::Integer(x), FieldRef::Integer(y)) => x.cmp(&y),
            (FieldRef::List(x), FieldRef::List(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }
}

enum FieldRef<'a> {
    Text(&'a str),
    Integer(i64),
    List(&'a [String]),
}

/// Comparison operator of a predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `!=`, counts as an inequality.
    Ne,
}

impl Operator {
    /// Resolve a client operator token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "EQ" => Some(Self::Eq),
            "GT" => Some(Self::Gt),
            "GTEQ" => Some(Self::GtEq),
            "LT" => Some(Self::Lt),
            "LTEQ" => Some(Self::LtEq),
            "NE" => Some(Self::Ne),
            _ => None,
        }
    }

    /// Everything except `Eq`.
    #[must_use]
    pub const fn is_inequality(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// SQL spelling of the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Ne => "<>",
        }
    }

    /// Whether `lhs.cmp(rhs) == ordering` satisfies `lhs <op> rhs`.
    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::GtEq => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::LtEq => !matches!(ordering, Ordering::Greater),
            Self::Ne => !matches!(ordering, Ordering::Equal),
        }
    }
}

/// Typed comparison value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterValue {
    /// Text comparison.
    Text(String),
    /// Integer comparison.
    Integer(i64),
}

/// A single typed condition `field <operator> value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    /// Attribute being compared.
    pub field: ConferenceField,
    /// Comparison.
    pub operator: Operator,
    /// Right-hand side.
    pub value: FilterValue,
}

impl Predicate {
    /// Build a predicate.
    #[must_use]
    pub const fn new(field: ConferenceField, operator: Operator, value: FilterValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    /// Evaluate the predicate against a conference.
    ///
    /// A value whose type does not match the field never matches.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        match (self.field.read(conference), &self.value) {
            (FieldRef::Text(actual), FilterValue::Text(expected)) => {
                self.operator.holds(actual.cmp(expected.as_str()))
            }
            (FieldRef::Integer(actual), FilterValue::Integer(expected)) => {
                self.operator.holds(actual.cmp(expected))
            }
            (FieldRef::List(items), FilterValue::Text(expected)) => items
                .iter()
                .any(|item| self.operator.holds(item.as_str().cmp(expected.as_str()))),
            _ => false,
        }
    }
}

/// A validated conjunctive query over conferences with its sort order.
///
/// Implementations break ties after the listed order by conference key so
/// results are deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    predicates: Vec<Predicate>,
    order: Vec<ConferenceField>,
}

impl QueryPlan {
    /// Every conference, ordered by name.
    #[must_use]
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
            order: vec![ConferenceField::Name],
        }
    }

    /// Build a plan from typed predicates, enforcing the single-inequality
    /// rule and deriving the sort order.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleInequalityFields`] when inequality
    /// operators touch more than one field.
    pub fn from_predicates(predicates: Vec<Predicate>) -> Result<Self, FilterError> {
        let mut inequality_field: Option<ConferenceField> = None;
        for predicate in predicates.iter().filter(|p| p.operator.is_inequality()) {
            match inequality_field {
                Some(field) if field != predicate.field => {
                    return Err(FilterError::MultipleInequalityFields);
                }
                _ => inequality_field = Some(predicate.field),
            }
        }

        let order = match inequality_field {
            Some(field) if field != ConferenceField::Name => vec![field, ConferenceField::Name],
            _ => vec![ConferenceField::Name],
        };

        Ok(Self { predicates, order })
    }

    /// The conjunctive predicates.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Sort keys, all ascending.
    #[must_use]
    pub fn order(&self) -> &[ConferenceField] {
        &self.order
    }

    /// The field carrying inequality predicates, if any.
    #[must_use]
    pub fn inequality_field(&self) -> Option<ConferenceField> {
        self.predicates
            .iter()
            .find(|p| p.operator.is_inequality())
            .map(|p| p.field)
    }

    /// Whether a conference satisfies every predicate.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        self.predicates.iter().all(|p| p.matches(conference))
    }

    /// Compare two conferences by the plan's sort order, then by key.
    #[must_use]
    pub fn compare(&self, a: &Conference, b: &Conference) -> Ordering {
        self.order
            .iter()
            .map(|field| field.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.key.cmp(&b.key))
    }

    /// Filter and sort an in-memory conference set.
    pub fn apply<I>(&self, conferences: I) -> Vec<Conference>
    where
        I: IntoIterator<Item = Conference>,
    {
        let mut matching: Vec<Conference> = conferences
            .into_iter()
            .filter(|c| self.matches(c))
            .collect();
        matching.sort_by(|a, b| self.compare(a, b));
        matching
    }
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self::all()
    }
}

/// Compile client filter triples into a [`QueryPlan`].
///
/// Every token is validated before any predicate is built, so an invalid
/// list never yields a partial plan.
///
/// # Errors
///
/// - [`FilterError::InvalidToken`] for an unknown field or operator
/// - [`FilterError::InvalidValue`] when a numeric field gets a non-integer
/// - [`FilterError::MultipleInequalityFields`] for inequalities on two fields
pub fn compile(filters: &[FilterSpec]) -> Result<QueryPlan, FilterError> {
    let predicates = filters
        .iter()
        .map(compile_one)
        .collect::<Result<Vec<_>, _>>()?;
    QueryPlan::from_predicates(predicates)
}

fn compile_one(spec: &FilterSpec) -> Result<Predicate, FilterError> {
    let (Some(field), Some(operator)) = (
        ConferenceField::from_token(&spec.field),
        Operator::from_token(&spec.operator),
    ) else {
        return Err(FilterError::InvalidToken {
            field: spec.field.clone(),
            operator: spec.operator.clone(),
        });
    };

    let value = if field.is_numeric() {
        spec.value
            .trim()
            .parse::<i64>()
            .map(FilterValue::Integer)
            .map_err(|_| FilterError::InvalidValue {
                field: field.token(),
                value: spec.value.clone(),
            })?
    } else {
        FilterValue::Text(spec.value.clone())
    };

    Ok(Predicate::new(field, operator, value))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::keys::{ConferenceKey, ProfileId};
    use proptest::prelude::*;

    fn conference(name: &str, city: &str, topics: &[&str], month: i32, max: i64) -> Conference {
        Conference {
            key: ConferenceKey::new(),
            organizer: ProfileId::new("organizer"),
            name: name.to_string(),
            description: None,
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
            city: city.to_string(),
            start_date: None,
            end_date: None,
            month,
            max_attendees: max,
            seats_available: max,
        }
    }

    fn names(conferences: &[Conference]) -> Vec<&str> {
        conferences.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn empty_filter_list_orders_by_name() {
        let plan = compile(&[]).unwrap();
        assert_eq!(plan, QueryPlan::all());
        let result = plan.apply(vec![
            conference("Zeta", "Rome", &[], 1, 5),
            conference("Alpha", "Paris", &[], 2, 5),
        ]);
        assert_eq!(names(&result), ["Alpha", "Zeta"]);
    }

    #[test]
    fn equality_on_city_orders_by_name() {
        let plan = compile(&[FilterSpec::new("CITY", "EQ", "Paris")]).unwrap();
        assert_eq!(plan.order(), &[ConferenceField::Name]);
        assert_eq!(
            plan.predicates(),
            &[Predicate::new(
                ConferenceField::City,
                Operator::Eq,
                FilterValue::Text("Paris".to_string())
            )]
        );

        let result = plan.apply(vec![
            conference("B", "Paris", &[], 0, 0),
            conference("C", "London", &[], 0, 0),
            conference("A", "Paris", &[], 0, 0),
        ]);
        assert_eq!(names(&result), ["A", "B"]);
    }

    #[test]
    fn inequality_field_leads_the_order() {
        let plan = compile(&[
            FilterSpec::new("MAX_ATTENDEES", "GT", "10"),
            FilterSpec::new("CITY", "EQ", "Paris"),
        ])
        .unwrap();
        assert_eq!(plan.inequality_field(), Some(ConferenceField::MaxAttendees));

        let result = plan.apply(vec![
            conference("Small", "Paris", &[], 0, 10),
            conference("Big B", "Paris", &[], 0, 200),
            conference("Big A", "Paris", &[], 0, 200),
            conference("Mid", "Paris", &[], 0, 50),
            conference("Elsewhere", "Lyon", &[], 0, 500),
        ]);
        assert_eq!(names(&result), ["Mid", "Big A", "Big B"]);
    }

    #[test]
    fn two_inequality_fields_are_rejected() {
        let err = compile(&[
            FilterSpec::new("MAX_ATTENDEES", "GT", "10"),
            FilterSpec::new("MONTH", "LT", "6"),
        ])
        .unwrap_err();
        assert_eq!(err, FilterError::MultipleInequalityFields);
    }

    #[test]
    fn not_equal_counts_as_inequality() {
        let err = compile(&[
            FilterSpec::new("CITY", "NE", "Paris"),
            FilterSpec::new("MONTH", "GT", "3"),
        ])
        .unwrap_err();
        assert_eq!(err, FilterError::MultipleInequalityFields);
    }

    #[test]
    fn several_inequalities_on_one_field_are_allowed() {
        let plan = compile(&[
            FilterSpec::new("MONTH", "GTEQ", "3"),
            FilterSpec::new("MONTH", "LT", "6"),
        ])
        .unwrap();
        let result = plan.apply(vec![
            conference("June", "X", &[], 6, 0),
            conference("March", "X", &[], 3, 0),
            conference("May", "X", &[], 5, 0),
        ]);
        assert_eq!(names(&result), ["March", "May"]);
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let err = compile(&[FilterSpec::new("COUNTRY", "EQ", "France")]).unwrap_err();
        assert_eq!(err.to_string(), "Filter contains invalid field or operator.");

        let err = compile(&[FilterSpec::new("CITY", "LIKE", "Par%")]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidToken { .. }));

        // lower-case tokens are not accepted
        assert!(compile(&[FilterSpec::new("city", "EQ", "Paris")]).is_err());
    }

    #[test]
    fn numeric_fields_require_integers() {
        let err = compile(&[FilterSpec::new("MONTH", "EQ", "June")]).unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidValue {
                field: "MONTH",
                value: "June".to_string()
            }
        );
        assert!(compile(&[FilterSpec::new("MAX_ATTENDEES", "EQ", " 42 ")]).is_ok());
    }

    #[test]
    fn invalid_token_wins_over_later_inequality_violation() {
        let err = compile(&[
            FilterSpec::new("MONTH", "GT", "1"),
            FilterSpec::new("CITY", "NE", "Rome"),
            FilterSpec::new("BOGUS", "EQ", "x"),
        ])
        .unwrap_err();
        assert!(matches!(err, FilterError::InvalidToken { .. }));
    }

    #[test]
    fn topic_predicate_matches_any_topic() {
        let plan = compile(&[FilterSpec::new("TOPIC", "EQ", "Rust")]).unwrap();
        let result = plan.apply(vec![
            conference("A", "X", &["Go", "Rust"], 0, 0),
            conference("B", "X", &["Python"], 0, 0),
            conference("C", "X", &[], 0, 0),
        ]);
        assert_eq!(names(&result), ["A"]);
    }

    #[test]
    fn internal_plans_can_filter_on_seats() {
        let plan = QueryPlan::from_predicates(vec![
            Predicate::new(
                ConferenceField::SeatsAvailable,
                Operator::LtEq,
                FilterValue::Integer(5),
            ),
            Predicate::new(
                ConferenceField::SeatsAvailable,
                Operator::Gt,
                FilterValue::Integer(0),
            ),
        ])
        .unwrap();
        assert_eq!(
            plan.order(),
            &[ConferenceField::SeatsAvailable, ConferenceField::Name]
        );

        let mut nearly_full = conference("Nearly", "X", &[], 0, 100);
        nearly_full.seats_available = 3;
        let mut full = conference("Full", "X", &[], 0, 100);
        full.seats_available = 0;
        let result = plan.apply(vec![nearly_full, full, conference("Open", "X", &[], 0, 100)]);
        assert_eq!(names(&result), ["Nearly"]);
    }

    #[test]
    fn mismatched_value_type_never_matches() {
        let predicate = Predicate::new(
            ConferenceField::Month,
            Operator::Eq,
            FilterValue::Text("3".to_string()),
        );
        assert!(!predicate.matches(&conference("A", "X", &[], 3, 0)));
    }

    fn any_field() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["CITY", "TOPIC", "MONTH", "MAX_ATTENDEES"])
    }

    fn any_operator() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["EQ", "GT", "GTEQ", "LT", "LTEQ", "NE"])
    }

    fn any_filter() -> impl Strategy<Value = FilterSpec> {
        (any_field(), any_operator(), 0..20i64)
            .prop_map(|(field, op, value)| FilterSpec::new(field, op, value.to_string()))
    }

    proptest! {
        #[test]
        fn single_inequality_rule_holds(filters in prop::collection::vec(any_filter(), 0..6)) {
            let mut inequality_fields: Vec<&str> = filters
                .iter()
                .filter(|f| f.operator != "EQ")
                .map(|f| f.field.as_str())
                .collect();
            inequality_fields.sort_unstable();
            inequality_fields.dedup();

            match compile(&filters) {
                Ok(plan) => {
                    prop_assert!(inequality_fields.len() <= 1);
                    prop_assert_eq!(plan.predicates().len(), filters.len());
                    prop_assert_eq!(plan.order().last(), Some(&ConferenceField::Name));
                    if let Some(field) = inequality_fields.first() {
                        prop_assert_eq!(plan.order()[0].token(), *field);
                    } else {
                        prop_assert_eq!(plan.order().len(), 1);
                    }
                }
                Err(err) => {
                    prop_assert!(inequality_fields.len() > 1);
                    prop_assert_eq!(err, FilterError::MultipleInequalityFields);
                }
            }
        }

        #[test]
        fn applied_plans_return_only_matches_in_order(
            filter in any_filter(),
            months in prop::collection::vec(0..13i32, 0..12),
        ) {
            let plan = compile(&[filter]).unwrap();
            let conferences: Vec<Conference> = months
                .iter()
                .enumerate()
                .map(|(i, month)| conference(&format!("c{i:02}"), "Paris", &["Rust"], *month, i64::from(*month) * 3))
                .collect();
            let result = plan.apply(conferences.clone());

            prop_assert!(result.iter().all(|c| plan.matches(c)));
            prop_assert_eq!(result.len(), conferences.iter().filter(|c| plan.matches(c)).count());
            for pair in result.windows(2) {
                prop_assert_ne!(plan.compare(&pair[0], &pair[1]), Ordering::Greater);
            }
        }
    }
}
