//! Cache key builders. Each key is derived only from the query that produced
//! the cached value, so equal queries always share an entry.

use crate::types::{DogFilter, PuppyFilter, ReviewFilter};

fn labels<T: AsRef<str>>(values: &[T]) -> String {
    let mut out = String::from("[");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(value.as_ref());
    }
    out.push(']');
    out
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[must_use]
pub fn puppies(filter: &PuppyFilter, page: usize) -> String {
    format!(
        "puppies:chocolates:{}:genders:{}:idPuppy:{}:readyToMove:{}:archived:{}:page:{}",
        labels(&filter.colors),
        labels(&filter.genders),
        optional(filter.id),
        optional(filter.ready_to_move),
        filter.archived,
        page
    )
}

#[must_use]
pub fn puppy(id: i32) -> String {
    format!("puppy:{id}")
}

#[must_use]
pub fn dogs(filter: &DogFilter, page: usize) -> String {
    format!(
        "dogs:chocolates:{}:genders:{}:idDog:{}:archived:{}:page:{}",
        labels(&filter.colors),
        labels(&filter.genders),
        optional(filter.id),
        filter.archived,
        page
    )
}

#[must_use]
pub fn dog(id: i32) -> String {
    format!("dog:{id}")
}

#[must_use]
pub fn reviews(filter: &ReviewFilter, page: usize) -> String {
    format!(
        "reviews:{}:{}:page:{}",
        optional(filter.id),
        filter.verified,
        page
    )
}

#[must_use]
pub fn puppy_review(puppy_id: i32, verified: Option<bool>) -> String {
    format!("feedback:{puppy_id}:verified:{}", optional(verified))
}
