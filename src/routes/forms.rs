//! Multipart record forms sent by the admin panel and the public review page.

use std::collections::HashMap;

use axum::extract::Multipart;
use log::debug;

use super::params::{parse_flag, record_id};
use crate::{
    error::{Result, SiteError},
    types::{CoatColor, Dog, Gender, Puppy, Review, UploadedFile},
};

/// Text fields, retained photo URLs and new files of one submitted form.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    existing: Vec<String>,
    files: Vec<UploadedFile>,
}

impl FormData {
    /// Drain a multipart body. `files` parts become uploads, `existingPhotos`
    /// parts list the photos to keep, every other part is a text field.
    ///
    /// # Errors
    ///
    /// Returns `Multipart` if the body is malformed or exceeds the size limit.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "files" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    debug!("Received file {} ({} bytes)", file_name, bytes.len());
                    form.files.push(UploadedFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                "existingPhotos" => {
                    let url = field.text().await?;
                    if !url.trim().is_empty() {
                        form.existing.push(url.trim().to_string());
                    }
                }
                _ => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed value of a text field, empty when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", |value| value.trim())
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` when the field is absent or blank.
    pub fn required(&self, name: &str) -> Result<&str> {
        match self.text(name) {
            "" => Err(SiteError::InvalidInput(format!("field {name} is required"))),
            value => Ok(value),
        }
    }

    pub fn into_files(self) -> Vec<UploadedFile> {
        self.files
    }

    /// Puppy described by the form, owning the retained photos.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a missing name, an unknown gender or coat
    /// color, or non-numeric parent ids.
    pub fn puppy(&self) -> Result<Puppy> {
        Ok(Puppy {
            id: 0,
            name: self.required("name")?.to_string(),
            title: self.text("title").to_string(),
            gender: gender(self.required("gender")?)?,
            price: self.text("price").to_string(),
            ready_out: self.text("readyToMoveAdd") == "true",
            archived: parse_flag("archived", self.text("archived"))?.unwrap_or(false),
            city: self.text("city").to_string(),
            mother_id: record_id(self.required("mother")?)?,
            father_id: record_id(self.required("father")?)?,
            date_birth: self.text("date").to_string(),
            color: color(self.required("color")?)?,
            urls: self.existing.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` for a missing name or an unknown gender or color.
    pub fn dog(&self) -> Result<Dog> {
        Ok(Dog {
            id: 0,
            name: self.required("name")?.to_string(),
            title: self.text("title").to_string(),
            gender: gender(self.required("gender")?)?,
            color: color(self.required("color")?)?,
            archived: parse_flag("archived", self.text("archived"))?.unwrap_or(false),
            urls: self.existing.clone(),
        })
    }

    /// Review written in the admin panel. A `puppyID` links it directly,
    /// otherwise the phone number does.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a missing name or a malformed puppy id.
    pub fn review(&self) -> Result<Review> {
        let puppy_id = match self.text("puppyID") {
            "" | "0" => None,
            raw => Some(record_id(raw)?),
        };
        Ok(Review {
            id: 0,
            puppy_id,
            name: self.required("name")?.to_string(),
            number: self.text("phone").to_string(),
            title: self.text("title").to_string(),
            verified: parse_flag("verified", self.text("verified"))?.unwrap_or(true),
            date: self.text("date").to_string(),
            urls: self.existing.clone(),
        })
    }
}

fn gender(raw: &str) -> Result<String> {
    raw.parse::<Gender>()
        .map(|gender| gender.to_string())
        .map_err(|_| SiteError::InvalidInput(format!("invalid gender: {raw}")))
}

fn color(raw: &str) -> Result<String> {
    raw.parse::<CoatColor>()
        .map(|color| color.to_string())
        .map_err(|_| SiteError::InvalidInput(format!("invalid chocolate color: {raw}")))
}
