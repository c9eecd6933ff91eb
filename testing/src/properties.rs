//! Proptest strategies for conference inputs.

use conference_core::filter::FilterSpec;
use proptest::prelude::*;

/// Field tokens accepted by the filter compiler.
pub const FIELD_TOKENS: [&str; 4] = ["CITY", "TOPIC", "MONTH", "MAX_ATTENDEES"];

/// Operator tokens accepted by the filter compiler.
pub const OPERATOR_TOKENS: [&str; 6] = ["EQ", "GT", "GTEQ", "LT", "LTEQ", "NE"];

/// A filter built only from valid tokens with an integer-looking value.
pub fn valid_filter() -> impl Strategy<Value = FilterSpec> {
    (
        prop::sample::select(FIELD_TOKENS.to_vec()),
        prop::sample::select(OPERATOR_TOKENS.to_vec()),
        0..400i64,
    )
        .prop_map(|(field, operator, value)| FilterSpec::new(field, operator, value.to_string()))
}

/// A filter whose field or operator may be outside the allow-list.
pub fn any_filter() -> impl Strategy<Value = FilterSpec> {
    prop_oneof![
        4 => valid_filter(),
        1 => ("[A-Z_]{1,12}", "[A-Z]{1,5}", "[a-z0-9]{0,6}")
            .prop_map(|(field, operator, value)| FilterSpec::new(field, operator, value)),
    ]
}

/// One step of a registration script against a single conference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationStep {
    /// User with this index registers.
    Register(usize),
    /// User with this index unregisters.
    Unregister(usize),
}

impl RegistrationStep {
    /// Index of the acting user.
    #[must_use]
    pub const fn user(&self) -> usize {
        match self {
            Self::Register(user) | Self::Unregister(user) => *user,
        }
    }
}

/// A sequence of registration steps by up to `users` distinct users.
pub fn registration_script(users: usize, max_len: usize) -> impl Strategy<Value = Vec<RegistrationStep>> {
    prop::collection::vec(
        prop_oneof![
            (0..users).prop_map(RegistrationStep::Register),
            (0..users).prop_map(RegistrationStep::Unregister),
        ],
        0..max_len,
    )
}
