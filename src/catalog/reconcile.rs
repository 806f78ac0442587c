//! Image association bookkeeping shared by every owning record kind.

use std::collections::HashSet;

use log::debug;
use sqlx::PgConnection;

use crate::{error::Result, types::EntityKind};

/// Difference between a record's persisted image URLs and the URLs a write
/// wants it to have.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationDiff {
    /// URLs to associate, in the order the write listed them.
    pub to_add: Vec<String>,
    /// URLs to dissociate, in their persisted order. Their objects are only
    /// removable when no other record still references them.
    pub to_delete: Vec<String>,
}

impl AssociationDiff {
    /// Set difference on exact URL equality. Duplicates collapse to their
    /// first occurrence.
    #[must_use]
    pub fn compute(current: &[String], desired: &[String]) -> Self {
        let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
        let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        let to_add = desired
            .iter()
            .filter(|url| !current_set.contains(url.as_str()) && seen.insert(url.as_str()))
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let to_delete = current
            .iter()
            .filter(|url| !desired_set.contains(url.as_str()) && seen.insert(url.as_str()))
            .cloned()
            .collect();

        Self { to_add, to_delete }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }
}

/// URLs currently associated with a record.
pub(super) async fn current_urls(
    conn: &mut PgConnection,
    kind: EntityKind,
    owner_id: i32,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT i.url FROM img_urls i JOIN {table} a ON a.img_url_id = i.id \
         WHERE a.{owner} = $1 ORDER BY i.id",
        table = kind.image_table(),
        owner = kind.owner_column(),
    );
    Ok(sqlx::query_scalar::<_, String>(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?)
}

/// Owning record kinds whose association tables can reference a URL row.
const OWNER_KINDS: [EntityKind; 3] = [EntityKind::Puppy, EntityKind::Dog, EntityKind::Review];

/// `urls` without repeats, first occurrence wins.
fn distinct(urls: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    urls.iter()
        .map(String::as_str)
        .filter(|url| seen.insert(*url))
        .collect()
}

/// Insert a URL row and an association row for each distinct URL.
pub(super) async fn attach(
    conn: &mut PgConnection,
    kind: EntityKind,
    owner_id: i32,
    urls: &[String],
) -> Result<()> {
    let link = format!(
        "INSERT INTO {table} ({owner}, img_url_id) VALUES ($1, $2)",
        table = kind.image_table(),
        owner = kind.owner_column(),
    );

    for url in distinct(urls) {
        let url_id: i32 = sqlx::query_scalar("INSERT INTO img_urls (url) VALUES ($1) RETURNING id")
            .bind(url)
            .fetch_one(&mut *conn)
            .await?;
        sqlx::query(&link)
            .bind(owner_id)
            .bind(url_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Remove this record's association rows for each URL, then exactly the URL
/// rows those associations pointed at. Rows of other records are untouched.
pub(super) async fn detach(
    conn: &mut PgConnection,
    kind: EntityKind,
    owner_id: i32,
    urls: &[String],
) -> Result<()> {
    let unlink = format!(
        "DELETE FROM {table} a USING img_urls i \
         WHERE a.img_url_id = i.id AND a.{owner} = $1 AND i.url = $2 \
         RETURNING a.img_url_id",
        table = kind.image_table(),
        owner = kind.owner_column(),
    );

    for url in distinct(urls) {
        let url_ids: Vec<i32> = sqlx::query_scalar(&unlink)
            .bind(owner_id)
            .bind(url)
            .fetch_all(&mut *conn)
            .await?;
        delete_url_rows(conn, &url_ids).await?;
    }
    Ok(())
}

/// Remove every association row of a record and the URL rows behind them.
/// Returns the URLs that were associated.
pub(super) async fn detach_all(
    conn: &mut PgConnection,
    kind: EntityKind,
    owner_id: i32,
) -> Result<Vec<String>> {
    let urls = current_urls(conn, kind, owner_id).await?;
    let unlink = format!(
        "DELETE FROM {table} WHERE {owner} = $1 RETURNING img_url_id",
        table = kind.image_table(),
        owner = kind.owner_column(),
    );
    let url_ids: Vec<i32> = sqlx::query_scalar(&unlink)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    delete_url_rows(conn, &url_ids).await?;
    Ok(urls)
}

async fn delete_url_rows(conn: &mut PgConnection, url_ids: &[i32]) -> Result<()> {
    if url_ids.is_empty() {
        return Ok(());
    }
    sqlx::query("DELETE FROM img_urls WHERE id = ANY($1)")
        .bind(url_ids)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// The subset of `urls`, in order and without repeats, that no association
/// row of any record kind references any more. Only those objects may be
/// removed from storage.
pub(super) async fn orphaned(conn: &mut PgConnection, urls: &[String]) -> Result<Vec<String>> {
    let candidates: Vec<String> = distinct(urls).into_iter().map(str::to_string).collect();
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let referenced = OWNER_KINDS
        .iter()
        .map(|kind| {
            format!(
                "EXISTS (SELECT 1 FROM {} a WHERE a.img_url_id = i.id)",
                kind.image_table()
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    let sql = format!(
        "SELECT u.url FROM UNNEST($1::TEXT[]) WITH ORDINALITY AS u(url, pos) \
         WHERE NOT EXISTS (SELECT 1 FROM img_urls i WHERE i.url = u.url AND ({referenced})) \
         ORDER BY u.pos"
    );
    Ok(sqlx::query_scalar::<_, String>(&sql)
        .bind(&candidates)
        .fetch_all(&mut *conn)
        .await?)
}

/// Bring a record's associations in line with `desired` and return the URLs
/// the change left without any association. Must run inside the transaction
/// that also carries the record's scalar changes.
pub(super) async fn reconcile(
    conn: &mut PgConnection,
    kind: EntityKind,
    owner_id: i32,
    desired: &[String],
) -> Result<Vec<String>> {
    let current = current_urls(conn, kind, owner_id).await?;
    let diff = AssociationDiff::compute(&current, desired);

    debug!(
        "Reconciling {} {} images: {} kept, {} added, {} removed",
        kind,
        owner_id,
        current.len().saturating_sub(diff.to_delete.len()),
        diff.to_add.len(),
        diff.to_delete.len()
    );

    detach(conn, kind, owner_id, &diff.to_delete).await?;
    attach(conn, kind, owner_id, &diff.to_add).await?;
    orphaned(conn, &diff.to_delete).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn set(values: &[String]) -> HashSet<String> {
        values.iter().cloned().collect()
    }

    #[test]
    fn replaces_one_photo() {
        let diff = AssociationDiff::compute(&urls(&["a", "b", "c"]), &urls(&["b", "c", "d"]));
        assert_eq!(diff.to_add, urls(&["d"]));
        assert_eq!(diff.to_delete, urls(&["a"]));
    }

    #[test]
    fn unchanged_set_is_empty() {
        let diff = AssociationDiff::compute(&urls(&["a", "b"]), &urls(&["b", "a"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let diff = AssociationDiff::compute(&urls(&["a", "a"]), &urls(&["b", "b", "c"]));
        assert_eq!(diff.to_add, urls(&["b", "c"]));
        assert_eq!(diff.to_delete, urls(&["a"]));
    }

    #[test]
    fn urls_compare_exactly() {
        let diff = AssociationDiff::compute(
            &urls(&["https://b.test/A.png"]),
            &urls(&["https://b.test/a.png"]),
        );
        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_delete.len(), 1);
    }

    #[test]
    fn applying_the_diff_yields_the_desired_set() {
        let cases = [
            (urls(&[]), urls(&[])),
            (urls(&[]), urls(&["x", "y"])),
            (urls(&["x", "y"]), urls(&[])),
            (urls(&["a", "b", "c"]), urls(&["b", "c", "d"])),
            (urls(&["a", "b"]), urls(&["c", "d", "a"])),
            (urls(&["a", "b", "b"]), urls(&["b", "a", "e", "e"])),
        ];

        for (current, desired) in cases {
            let diff = AssociationDiff::compute(&current, &desired);
            let current_set = set(&current);
            let desired_set = set(&desired);
            let added = set(&diff.to_add);
            let deleted = set(&diff.to_delete);

            assert!(added.is_disjoint(&current_set), "{current:?} -> {desired:?}");
            assert!(deleted.is_disjoint(&desired_set), "{current:?} -> {desired:?}");

            let result: HashSet<String> = current_set
                .difference(&deleted)
                .cloned()
                .chain(added)
                .collect();
            assert_eq!(result, desired_set, "{current:?} -> {desired:?}");
        }
    }
}
