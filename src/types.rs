//! Common types used throughout the kennel site.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};

use crate::media::ImageSpec;

/// Kind of record that owns image assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Puppy,
    Dog,
    Review,
}

impl EntityKind {
    /// Association table linking records to rows of `img_urls`.
    #[must_use]
    pub fn image_table(self) -> &'static str {
        match self {
            EntityKind::Puppy => "puppies_img",
            EntityKind::Dog => "adult_dogs_img",
            EntityKind::Review => "reviews_img",
        }
    }

    /// Column of the association table that references the owning record.
    #[must_use]
    pub fn owner_column(self) -> &'static str {
        match self {
            EntityKind::Puppy => "puppy_id",
            EntityKind::Dog => "adult_dogs_id",
            EntityKind::Review => "reviews_id",
        }
    }

    /// Crop ratio and output size applied to every image uploaded for this kind.
    #[must_use]
    pub fn image_spec(self) -> ImageSpec {
        match self {
            EntityKind::Puppy | EntityKind::Dog => ImageSpec::new(3.0 / 2.0, 1200, 800),
            EntityKind::Review => ImageSpec::new(1.0, 1000, 1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames, AsRefStr, Display)]
pub enum Gender {
    #[strum(serialize = "Кобель")]
    Male,
    #[strum(serialize = "Сука")]
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames, AsRefStr, Display)]
pub enum CoatColor {
    #[strum(serialize = "Классический")]
    Classic,
    #[strum(serialize = "Шоколадный")]
    Chocolate,
    #[strum(serialize = "Черный")]
    Black,
    #[strum(serialize = "Биро")]
    Biro,
    #[strum(serialize = "Бивер")]
    Biewer,
    #[strum(serialize = "Голддаст")]
    GoldDust,
    #[strum(serialize = "Черный мерле")]
    BlackMerle,
    #[strum(serialize = "Шоколадный мерле")]
    ChocolateMerle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Puppy {
    pub id: i32,
    pub name: String,
    pub title: String,
    pub gender: String,
    pub price: String,
    pub ready_out: bool,
    pub archived: bool,
    pub city: String,
    pub mother_id: i32,
    pub father_id: i32,
    pub date_birth: String,
    pub color: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dog {
    pub id: i32,
    pub name: String,
    pub title: String,
    pub gender: String,
    pub color: String,
    pub archived: bool,
    pub urls: Vec<String>,
}

/// Customer review of a sold puppy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i32,
    pub puppy_id: Option<i32>,
    pub name: String,
    /// Buyer phone number, used to find the puppy the review belongs to.
    pub number: String,
    pub title: String,
    pub verified: bool,
    pub date: String,
    pub urls: Vec<String>,
}

/// Archive toggle for a puppy; archiving records where it went and who bought it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PuppyArchiveChange {
    pub archived: bool,
    pub city: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PuppyFilter {
    pub colors: Vec<CoatColor>,
    pub genders: Vec<Gender>,
    pub id: Option<i32>,
    pub ready_to_move: Option<bool>,
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DogFilter {
    pub colors: Vec<CoatColor>,
    pub genders: Vec<Gender>,
    pub id: Option<i32>,
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub id: Option<i32>,
    pub verified: bool,
}

/// One page of puppies plus the review attached to each puppy (puppy id -> review id).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuppyListing {
    pub puppies: Vec<Puppy>,
    pub total_pages: usize,
    pub review_ids: HashMap<i32, i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuppyProfile {
    pub puppy: Puppy,
    pub mother: Option<Dog>,
    pub father: Option<Dog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DogListing {
    pub dogs: Vec<Dog>,
    pub total_pages: usize,
}

/// One page of reviews plus the name of the puppy each review is about (review id -> name).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewListing {
    pub reviews: Vec<Review>,
    pub total_pages: usize,
    pub puppy_names: HashMap<i32, String>,
}

/// Raw file part taken from an upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}
