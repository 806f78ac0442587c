//! Query-string parsing and validation of listing filters.

use std::str::FromStr;

use crate::{
    error::{Result, SiteError},
    types::{CoatColor, DogFilter, Gender, PuppyFilter, ReviewFilter},
};

/// Largest id accepted on public detail pages.
pub const MAX_PUBLIC_ID: i32 = 1000;

/// Decoded query string that keeps repeated keys.
#[derive(Debug, Default)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|raw| url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// First value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of `name`, in order.
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Requested page; missing or empty means the first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` unless the value is a positive integer.
    pub fn page(&self) -> Result<usize> {
        match self.get("page") {
            None | Some("") => Ok(1),
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| SiteError::InvalidInput("invalid page number".into())),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` for values other than `true`, `false` or empty.
    pub fn flag(&self, name: &str) -> Result<Option<bool>> {
        parse_flag(name, self.get(name).unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` for an unknown coat color or gender, or a bad flag.
    pub fn puppy_filter(&self) -> Result<PuppyFilter> {
        Ok(PuppyFilter {
            colors: labels(&self.all("chocolate"), "chocolate color")?,
            genders: labels(&self.all("gender"), "gender")?,
            id: None,
            ready_to_move: self.flag("readyToMove")?,
            archived: self.flag("archived")?.unwrap_or(false),
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` for an unknown coat color or gender, or a bad flag.
    pub fn dog_filter(&self) -> Result<DogFilter> {
        Ok(DogFilter {
            colors: labels(&self.all("chocolate"), "chocolate color")?,
            genders: labels(&self.all("gender"), "gender")?,
            id: None,
            archived: self.flag("archived")?.unwrap_or(false),
        })
    }

    /// Reviews are verified unless the query says otherwise.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad flag.
    pub fn review_filter(&self) -> Result<ReviewFilter> {
        Ok(ReviewFilter {
            id: None,
            verified: self.flag("verified")?.unwrap_or(true),
        })
    }
}

/// Parse a form or query boolean where empty means "not given".
///
/// # Errors
///
/// Returns `InvalidInput` for values other than `true`, `false` or empty.
pub fn parse_flag(name: &str, raw: &str) -> Result<Option<bool>> {
    match raw {
        "" => Ok(None),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(SiteError::InvalidInput(format!(
            "invalid {name} value: {other}"
        ))),
    }
}

fn labels<T: FromStr>(values: &[&str], what: &str) -> Result<Vec<T>> {
    values
        .iter()
        .map(|value| {
            value
                .parse()
                .map_err(|_| SiteError::InvalidInput(format!("invalid {what}: {value}")))
        })
        .collect()
}

/// Id taken from a public URL: digits only, at most [`MAX_PUBLIC_ID`].
///
/// # Errors
///
/// Returns `NotFound` for anything else so probing ids looks like a missing page.
pub fn public_id(raw: &str) -> Result<i32> {
    let not_found = || SiteError::NotFound(format!("Page {raw}"));
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_found());
    }
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id <= MAX_PUBLIC_ID)
        .ok_or_else(not_found)
}

/// Id taken from an admin URL or form field.
///
/// # Errors
///
/// Returns `InvalidInput` unless `raw` is an integer.
pub fn record_id(raw: &str) -> Result<i32> {
    raw.trim()
        .parse()
        .map_err(|_| SiteError::InvalidInput(format!("invalid id: {raw}")))
}
