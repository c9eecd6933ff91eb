//! SQL rendering of conference query plans.
//!
//! Text comparisons and text ordering use the `"C"` collation so results
//! come back in the same byte order as the in-memory store.

use conference_core::filter::{ConferenceField, FilterValue, Predicate, QueryPlan};
use conference_core::store::SessionQuery;
use sqlx::{Postgres, QueryBuilder};

pub(crate) const CONFERENCE_COLUMNS: &str = "key, organizer, name, description, topics, city, \
     start_date, end_date, month, max_attendees, seats_available, version";

pub(crate) const SESSION_COLUMNS: &str = "key, conference_key, name, highlights, speaker, \
     duration, date, start_time, type_of_session, created_at";

const fn column(field: ConferenceField) -> &'static str {
    match field {
        ConferenceField::City => "city",
        ConferenceField::Topic => "topics",
        ConferenceField::Month => "month",
        ConferenceField::MaxAttendees => "max_attendees",
        ConferenceField::SeatsAvailable => "seats_available",
        ConferenceField::Name => "name",
    }
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    let op = predicate.operator.sql();
    match (predicate.field, &predicate.value) {
        (ConferenceField::Topic, FilterValue::Text(value)) => {
            builder.push(format!(
                "EXISTS (SELECT 1 FROM unnest(topics) AS t(topic) WHERE t.topic COLLATE \"C\" {op} "
            ));
            builder.push_bind(value.clone());
            builder.push(")");
        }
        (field, FilterValue::Integer(value)) if field.is_numeric() => {
            builder.push(format!("{} {op} ", column(field)));
            builder.push_bind(*value);
        }
        (field, FilterValue::Text(value)) if !field.is_numeric() => {
            builder.push(format!("{} COLLATE \"C\" {op} ", column(field)));
            builder.push_bind(value.clone());
        }
        // a value of the wrong type never matches
        _ => {
            builder.push("FALSE");
        }
    }
}

/// Build `SELECT ... FROM conferences` with `plan`'s filters and order.
pub(crate) fn conference_query(plan: &QueryPlan) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {CONFERENCE_COLUMNS} FROM conferences"));

    for (i, predicate) in plan.predicates().iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_predicate(&mut builder, predicate);
    }

    builder.push(" ORDER BY ");
    for field in plan.order() {
        if field.is_numeric() {
            builder.push(format!("{}, ", column(*field)));
        } else {
            builder.push(format!("{} COLLATE \"C\", ", column(*field)));
        }
    }
    builder.push("key");
    builder
}

/// Build `SELECT ... FROM sessions` for a conjunctive session query.
pub(crate) fn session_query(query: &SessionQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE TRUE"));

    if let Some(conference) = query.conference {
        builder.push(" AND conference_key = ");
        builder.push_bind(*conference.as_uuid());
    }
    if let Some(speaker) = &query.speaker {
        builder.push(" AND speaker = ");
        builder.push_bind(speaker.clone());
    }
    if let Some(name) = &query.name {
        builder.push(" AND name = ");
        builder.push_bind(name.clone());
    }
    if let Some(tag) = &query.type_of_session {
        builder.push(" AND ");
        builder.push_bind(tag.clone());
        builder.push(" = ANY(type_of_session)");
    }
    if let Some(limit) = query.starts_at_or_before {
        builder.push(" AND start_time IS NOT NULL AND start_time <= ");
        builder.push_bind(limit);
    }

    builder.push(" ORDER BY created_at, key");
    builder
}
