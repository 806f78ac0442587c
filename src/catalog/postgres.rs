use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info};
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions};

use super::{DogRepo, PuppyRepo, ReviewRepo, SubscriberRepo, reconcile};
use crate::{
    error::{Result, SiteError},
    types::{
        Dog, DogFilter, EntityKind, Puppy, PuppyArchiveChange, PuppyFilter, Review, ReviewFilter,
    },
};

const SCHEMA: &str = include_str!("schema.sql");

const PUPPY_SELECT: &str = "SELECT p.id, p.name, p.title, p.gender, p.price, p.ready_out, \
     p.archived, p.city, p.mother_id, p.father_id, p.date_birth, p.color, \
     COALESCE(array_agg(i.url ORDER BY i.id) FILTER (WHERE i.url IS NOT NULL), '{}') AS urls \
     FROM puppies p \
     LEFT JOIN puppies_img pi ON pi.puppy_id = p.id \
     LEFT JOIN img_urls i ON i.id = pi.img_url_id";

const DOG_SELECT: &str = "SELECT d.id, d.name, d.title, d.gender, d.color, d.archived, \
     COALESCE(array_agg(i.url ORDER BY i.id) FILTER (WHERE i.url IS NOT NULL), '{}') AS urls \
     FROM adult_dogs d \
     LEFT JOIN adult_dogs_img di ON di.adult_dogs_id = d.id \
     LEFT JOIN img_urls i ON i.id = di.img_url_id";

const REVIEW_SELECT: &str = "SELECT r.id, r.puppy_id, r.name, r.\"number\", r.title, r.verified, r.date, \
     COALESCE(array_agg(i.url ORDER BY i.id) FILTER (WHERE i.url IS NOT NULL), '{}') AS urls \
     FROM reviews r \
     LEFT JOIN reviews_img ri ON ri.reviews_id = r.id \
     LEFT JOIN img_urls i ON i.id = ri.img_url_id";

fn schema_statements(schema: &str) -> impl Iterator<Item = &str> {
    schema.split(';').map(str::trim).filter(|statement| {
        statement
            .lines()
            .map(str::trim)
            .any(|line| !line.is_empty() && !line.starts_with("--"))
    })
}

fn labels<T: AsRef<str>>(values: &[T]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

fn not_found(kind: EntityKind, id: i32) -> SiteError {
    SiteError::NotFound(format!("{} {id}", capitalized(kind)))
}

fn capitalized(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Puppy => "Puppy",
        EntityKind::Dog => "Dog",
        EntityKind::Review => "Review",
    }
}

/// Catalog stored in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Connect the pool and make sure the tables exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or a schema
    /// statement fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        info!("Connected to PostgreSQL ({} connections max)", max_connections);
        Ok(catalog)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in schema_statements(SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl PuppyRepo for PostgresCatalog {
    async fn list_puppies(&self, filter: &PuppyFilter) -> Result<Vec<Puppy>> {
        let mut query = QueryBuilder::<Postgres>::new(PUPPY_SELECT);
        query.push(" WHERE p.archived = ").push_bind(filter.archived);
        if !filter.colors.is_empty() {
            query
                .push(" AND p.color = ANY(")
                .push_bind(labels(&filter.colors))
                .push(")");
        }
        if !filter.genders.is_empty() {
            query
                .push(" AND p.gender = ANY(")
                .push_bind(labels(&filter.genders))
                .push(")");
        }
        if let Some(ready) = filter.ready_to_move {
            query.push(" AND p.ready_out = ").push_bind(ready);
        }
        if let Some(id) = filter.id {
            query.push(" AND p.id = ").push_bind(id);
        }
        query.push(" GROUP BY p.id ORDER BY p.id DESC");

        Ok(query.build_query_as::<Puppy>().fetch_all(&self.pool).await?)
    }

    async fn puppy(&self, id: i32) -> Result<Option<Puppy>> {
        let sql = format!("{PUPPY_SELECT} WHERE p.id = $1 GROUP BY p.id");
        Ok(sqlx::query_as::<_, Puppy>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn puppy_review_ids(&self) -> Result<HashMap<i32, i32>> {
        let rows: Vec<(i32, i32)> =
            sqlx::query_as("SELECT puppy_id, id FROM reviews WHERE puppy_id > 0 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_puppy(&self, puppy: &Puppy) -> Result<i32> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO puppies (name, title, gender, price, ready_out, archived, city, \
             mother_id, father_id, date_birth, color) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        )
        .bind(&puppy.name)
        .bind(&puppy.title)
        .bind(&puppy.gender)
        .bind(&puppy.price)
        .bind(puppy.ready_out)
        .bind(puppy.archived)
        .bind(&puppy.city)
        .bind(puppy.mother_id)
        .bind(puppy.father_id)
        .bind(&puppy.date_birth)
        .bind(&puppy.color)
        .fetch_one(&mut *tx)
        .await?;

        reconcile::attach(&mut tx, EntityKind::Puppy, id, &puppy.urls).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_puppy(&self, puppy: &Puppy) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE puppies SET name = $1, title = $2, gender = $3, price = $4, ready_out = $5, \
             archived = $6, city = $7, mother_id = $8, father_id = $9, date_birth = $10, \
             color = $11 WHERE id = $12 RETURNING id",
        )
        .bind(&puppy.name)
        .bind(&puppy.title)
        .bind(&puppy.gender)
        .bind(&puppy.price)
        .bind(puppy.ready_out)
        .bind(puppy.archived)
        .bind(&puppy.city)
        .bind(puppy.mother_id)
        .bind(puppy.father_id)
        .bind(&puppy.date_birth)
        .bind(&puppy.color)
        .bind(puppy.id)
        .fetch_optional(&mut *tx)
        .await?;
        if updated.is_none() {
            return Err(not_found(EntityKind::Puppy, puppy.id));
        }

        let orphans =
            reconcile::reconcile(&mut tx, EntityKind::Puppy, puppy.id, &puppy.urls).await?;
        tx.commit().await?;
        Ok(orphans)
    }

    async fn delete_puppy(&self, id: i32) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let mut released = reconcile::detach_all(&mut tx, EntityKind::Puppy, id).await?;
        let review_ids: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM reviews WHERE puppy_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        for review_id in review_ids {
            released.extend(reconcile::detach_all(&mut tx, EntityKind::Review, review_id).await?);
        }

        sqlx::query("DELETE FROM puppies_member WHERE puppy_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reviews WHERE puppy_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM puppies WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(not_found(EntityKind::Puppy, id));
        }

        let orphans = reconcile::orphaned(&mut tx, &released).await?;
        tx.commit().await?;
        Ok(orphans)
    }

    async fn set_puppy_archived(&self, id: i32, change: &PuppyArchiveChange) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE puppies SET archived = $1, city = $2 WHERE id = $3")
            .bind(change.archived)
            .bind(&change.city)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(not_found(EntityKind::Puppy, id));
        }

        if !change.phone.is_empty() {
            let member = sqlx::query("UPDATE puppies_member SET \"number\" = $1 WHERE puppy_id = $2")
                .bind(&change.phone)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if member.rows_affected() == 0 {
                sqlx::query("INSERT INTO puppies_member (puppy_id, \"number\") VALUES ($1, $2)")
                    .bind(id)
                    .bind(&change.phone)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl DogRepo for PostgresCatalog {
    async fn list_dogs(&self, filter: &DogFilter) -> Result<Vec<Dog>> {
        let mut query = QueryBuilder::<Postgres>::new(DOG_SELECT);
        query.push(" WHERE d.archived = ").push_bind(filter.archived);
        if !filter.colors.is_empty() {
            query
                .push(" AND d.color = ANY(")
                .push_bind(labels(&filter.colors))
                .push(")");
        }
        if !filter.genders.is_empty() {
            query
                .push(" AND d.gender = ANY(")
                .push_bind(labels(&filter.genders))
                .push(")");
        }
        if let Some(id) = filter.id {
            query.push(" AND d.id = ").push_bind(id);
        }
        query.push(" GROUP BY d.id ORDER BY d.id DESC");

        Ok(query.build_query_as::<Dog>().fetch_all(&self.pool).await?)
    }

    async fn dog(&self, id: i32) -> Result<Option<Dog>> {
        let sql = format!("{DOG_SELECT} WHERE d.id = $1 GROUP BY d.id");
        Ok(sqlx::query_as::<_, Dog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_dog(&self, dog: &Dog) -> Result<i32> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO adult_dogs (name, title, gender, color, archived) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&dog.name)
        .bind(&dog.title)
        .bind(&dog.gender)
        .bind(&dog.color)
        .bind(dog.archived)
        .fetch_one(&mut *tx)
        .await?;

        reconcile::attach(&mut tx, EntityKind::Dog, id, &dog.urls).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_dog(&self, dog: &Dog) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE adult_dogs SET name = $1, title = $2, gender = $3, color = $4, archived = $5 \
             WHERE id = $6 RETURNING id",
        )
        .bind(&dog.name)
        .bind(&dog.title)
        .bind(&dog.gender)
        .bind(&dog.color)
        .bind(dog.archived)
        .bind(dog.id)
        .fetch_optional(&mut *tx)
        .await?;
        if updated.is_none() {
            return Err(not_found(EntityKind::Dog, dog.id));
        }

        let orphans = reconcile::reconcile(&mut tx, EntityKind::Dog, dog.id, &dog.urls).await?;
        tx.commit().await?;
        Ok(orphans)
    }

    async fn set_dog_archived(&self, id: i32, archived: bool) -> Result<()> {
        let updated = sqlx::query("UPDATE adult_dogs SET archived = $1 WHERE id = $2")
            .bind(archived)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(not_found(EntityKind::Dog, id));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepo for PostgresCatalog {
    async fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>> {
        let sql = format!(
            "{REVIEW_SELECT} WHERE r.verified = $1 AND ($2::INTEGER IS NULL OR r.id = $2) \
             GROUP BY r.id ORDER BY r.id DESC"
        );
        Ok(sqlx::query_as::<_, Review>(&sql)
            .bind(filter.verified)
            .bind(filter.id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn review_for_puppy(
        &self,
        puppy_id: i32,
        verified: Option<bool>,
    ) -> Result<Option<Review>> {
        let sql = format!(
            "{REVIEW_SELECT} WHERE r.puppy_id = $1 AND ($2::BOOLEAN IS NULL OR r.verified = $2) \
             GROUP BY r.id ORDER BY r.id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Review>(&sql)
            .bind(puppy_id)
            .bind(verified)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn review_puppy_names(&self) -> Result<HashMap<i32, String>> {
        let rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT r.id, p.name FROM reviews r JOIN puppies p ON p.id = r.puppy_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_review(&self, review: &Review) -> Result<i32> {
        let mut tx = self.pool.begin().await?;

        let puppy_id = match review.puppy_id {
            Some(id) => id,
            None => sqlx::query_scalar::<_, i32>(
                "SELECT puppy_id FROM puppies_member WHERE \"number\" = $1 LIMIT 1",
            )
            .bind(&review.number)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                SiteError::InvalidInput("No puppy is registered for this phone number.".into())
            })?,
        };

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO reviews (puppy_id, name, \"number\", title, verified, date) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(puppy_id)
        .bind(&review.name)
        .bind(&review.number)
        .bind(&review.title)
        .bind(review.verified)
        .bind(&review.date)
        .fetch_one(&mut *tx)
        .await?;

        reconcile::attach(&mut tx, EntityKind::Review, id, &review.urls).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_review(&self, review: &Review) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE reviews SET puppy_id = $1, name = $2, \"number\" = $3, title = $4, \
             verified = $5, date = $6 WHERE id = $7 RETURNING id",
        )
        .bind(review.puppy_id)
        .bind(&review.name)
        .bind(&review.number)
        .bind(&review.title)
        .bind(review.verified)
        .bind(&review.date)
        .bind(review.id)
        .fetch_optional(&mut *tx)
        .await?;
        if updated.is_none() {
            return Err(not_found(EntityKind::Review, review.id));
        }

        let orphans =
            reconcile::reconcile(&mut tx, EntityKind::Review, review.id, &review.urls).await?;
        tx.commit().await?;
        Ok(orphans)
    }

    async fn delete_review(&self, id: i32) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let released = reconcile::detach_all(&mut tx, EntityKind::Review, id).await?;
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(not_found(EntityKind::Review, id));
        }

        let orphans = reconcile::orphaned(&mut tx, &released).await?;
        tx.commit().await?;
        Ok(orphans)
    }

    async fn set_review_verified(&self, id: i32, verified: bool) -> Result<()> {
        let updated = sqlx::query("UPDATE reviews SET verified = $1 WHERE id = $2")
            .bind(verified)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(not_found(EntityKind::Review, id));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriberRepo for PostgresCatalog {
    async fn add_subscriber(&self, email: &str) -> Result<bool> {
        let inserted =
            sqlx::query("INSERT INTO subscribers (email) VALUES ($1) ON CONFLICT (email) DO NOTHING")
                .bind(email)
                .execute(&self.pool)
                .await?;
        Ok(inserted.rows_affected() > 0)
    }

    async fn subscribers(&self) -> Result<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT email FROM subscribers ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
