use crate::error::StoreError;
use crate::filters::{SearchFilters, SearchParams};
use crate::models::{Language, NewTranslation, Page, Tag, Translation, TranslationChanges, TranslationFields};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::debug;

const SCHEMA: [(&str, &str); 9] = [
    (
        "languages",
        "CREATE TABLE IF NOT EXISTS languages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "tags",
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "translations",
        r#"CREATE TABLE IF NOT EXISTS translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            language_id INTEGER NULL REFERENCES languages(id) ON DELETE CASCADE,
            locale TEXT NOT NULL,
            tag TEXT NULL,
            name TEXT NOT NULL,
            "key" TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE ("key", locale)
        )"#,
    ),
    (
        "translations_locale_index",
        "CREATE INDEX IF NOT EXISTS translations_locale_index ON translations (locale)",
    ),
    (
        "translations_key_index",
        r#"CREATE INDEX IF NOT EXISTS translations_key_index ON translations ("key")"#,
    ),
    (
        "translations_content_index",
        "CREATE INDEX IF NOT EXISTS translations_content_index ON translations (content)",
    ),
    (
        "translations_tag_index",
        "CREATE INDEX IF NOT EXISTS translations_tag_index ON translations (tag)",
    ),
    (
        "tag_translation",
        "CREATE TABLE IF NOT EXISTS tag_translation (
            translation_id INTEGER NOT NULL REFERENCES translations(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (translation_id, tag_id)
        )",
    ),
    (
        "tag_translation_tag_index",
        "CREATE INDEX IF NOT EXISTS tag_translation_tag_index ON tag_translation (tag_id, translation_id)",
    ),
];

const TRANSLATION_SELECT: &str = r#"SELECT t.id, t."key", t.content, t.locale, t.language_id, t.tag, t.name,
        t.created_at, t.updated_at, l.code AS language_code, l.name AS language_name
    FROM translations t
    LEFT JOIN languages l ON l.id = t.language_id"#;

#[derive(Debug, sqlx::FromRow)]
struct TranslationRow {
    id: i64,
    key: String,
    content: String,
    locale: String,
    language_id: Option<i64>,
    tag: Option<String>,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    language_code: Option<String>,
    language_name: Option<String>,
}

impl TranslationRow {
    fn into_translation(self, tags: Vec<Tag>) -> Translation {
        let language = match (self.language_id, self.language_code, self.language_name) {
            (Some(id), Some(code), Some(name)) => Some(Language { id, code, name }),
            _ => None,
        };

        Translation {
            id: self.id,
            key: self.key,
            content: self.content,
            locale: self.locale,
            language_id: self.language_id,
            tag: self.tag,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
            language,
            tags,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TagLink {
    translation_id: i64,
    id: i64,
    name: String,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and create tables
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context(format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context(format!("Failed to open database at {}", database_url))?;

        for (name, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context(format!("Failed to create {}", name))?;
        }

        Ok(Self { pool })
    }

    // ==================== Translations ====================

    /// Insert a translation and its tag associations in one transaction
    pub async fn create_translation(&self, new: &NewTranslation) -> Result<Translation, StoreError> {
        let fields = &new.fields;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"INSERT INTO translations ("key", content, locale, language_id, tag, name, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"#,
        )
        .bind(&fields.key)
        .bind(&fields.content)
        .bind(&fields.locale)
        .bind(fields.language_id)
        .bind(&fields.tag)
        .bind(&fields.name)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_write(e, &fields.key, &fields.locale))?
        .last_insert_rowid();

        insert_tag_links(&mut tx, id, &new.tag_ids).await?;
        tx.commit().await?;

        debug!("Inserted translation {} ({})", id, fields.key);
        self.require_translation(id).await
    }

    /// Apply changes to an existing translation
    ///
    /// Returns `None` if no translation has this id. When the changes carry
    /// a tag list, the associations are replaced wholesale.
    pub async fn update_translation(
        &self,
        id: i64,
        changes: &TranslationChanges,
    ) -> Result<Option<Translation>, StoreError> {
        // Take the write lock before reading so concurrent partial updates serialize
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let sql = format!("{} WHERE t.id = ?1", TRANSLATION_SELECT);
        let row: Option<TranslationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let existing = row.into_translation(Vec::new());
        let fields: TranslationFields = changes.apply_to(&existing);

        sqlx::query(
            r#"UPDATE translations
               SET "key" = ?1, content = ?2, locale = ?3, language_id = ?4, tag = ?5, name = ?6, updated_at = ?7
               WHERE id = ?8"#,
        )
        .bind(&fields.key)
        .bind(&fields.content)
        .bind(&fields.locale)
        .bind(fields.language_id)
        .bind(&fields.tag)
        .bind(&fields.name)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_write(e, &fields.key, &fields.locale))?;

        if let Some(tag_ids) = &changes.tag_ids {
            sqlx::query("DELETE FROM tag_translation WHERE translation_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_tag_links(&mut tx, id, tag_ids).await?;
        }

        tx.commit().await?;
        self.get_translation(id).await
    }

    /// Delete a translation; its tag links go with it via cascade
    pub async fn delete_translation(&self, id: i64) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query("DELETE FROM translations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Get a translation with its language and tags
    pub async fn get_translation(&self, id: i64) -> Result<Option<Translation>, StoreError> {
        let sql = format!("{} WHERE t.id = ?1", TRANSLATION_SELECT);
        let row: Option<TranslationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut tags = self.load_tags(&[row.id]).await?;
                let row_tags = tags.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_translation(row_tags)))
            }
            None => Ok(None),
        }
    }

    async fn require_translation(&self, id: i64) -> Result<Translation, StoreError> {
        self.get_translation(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    /// Run a filtered, paginated search
    ///
    /// Filters combine with AND; the tag id and tag name lists each match
    /// a translation carrying any one of the listed tags. Rows are ordered
    /// by id so pages never drift between calls.
    pub async fn search_translations(&self, params: &SearchParams) -> Result<Page<Translation>, StoreError> {
        let filters = &params.filters;

        let mut count_query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM translations t");
        push_filters(&mut count_query, filters);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let total = u64::try_from(total).unwrap_or_default();

        let offset = params.offset();
        if total == 0 || offset >= total {
            return Ok(Page::new(Vec::new(), params.page, params.per_page, total));
        }

        let mut items_query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(TRANSLATION_SELECT);
        push_filters(&mut items_query, filters);
        items_query
            .push(" ORDER BY t.id LIMIT ")
            .push_bind(i64::from(params.per_page))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows: Vec<TranslationRow> = items_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut tags = self.load_tags(&ids).await?;
        let items = rows
            .into_iter()
            .map(|row| {
                let row_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_translation(row_tags)
            })
            .collect();

        Ok(Page::new(items, params.page, params.per_page, total))
    }

    /// Flat key -> content map of every translation in a locale
    ///
    /// Only the two exported columns are read.
    pub async fn export_locale(&self, locale: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"SELECT "key", content FROM translations WHERE locale = ?1 ORDER BY "key""#,
        )
        .bind(locale)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Insert many rows at once, used by seeding
    pub async fn insert_translations(&self, rows: &[(TranslationFields, Vec<i64>)]) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (fields, tag_ids) in rows {
            let id = sqlx::query(
                r#"INSERT INTO translations ("key", content, locale, language_id, tag, name, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"#,
            )
            .bind(&fields.key)
            .bind(&fields.content)
            .bind(&fields.locale)
            .bind(fields.language_id)
            .bind(&fields.tag)
            .bind(&fields.name)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_write(e, &fields.key, &fields.locale))?
            .last_insert_rowid();

            insert_tag_links(&mut tx, id, tag_ids).await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    async fn load_tags(&self, translation_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>, StoreError> {
        let mut by_translation: HashMap<i64, Vec<Tag>> = HashMap::new();
        if translation_ids.is_empty() {
            return Ok(by_translation);
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT tt.translation_id, g.id, g.name
             FROM tag_translation tt
             JOIN tags g ON g.id = tt.tag_id
             WHERE tt.translation_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in translation_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY g.id");

        let links: Vec<TagLink> = query.build_query_as().fetch_all(&self.pool).await?;
        for link in links {
            by_translation.entry(link.translation_id).or_default().push(Tag {
                id: link.id,
                name: link.name,
            });
        }

        Ok(by_translation)
    }

    // ==================== Languages ====================

    pub async fn list_languages(&self) -> Result<Vec<Language>, StoreError> {
        let languages = sqlx::query_as("SELECT id, code, name FROM languages ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(languages)
    }

    /// Insert a language or rename the existing one with the same code
    pub async fn upsert_language(&self, code: &str, name: &str) -> Result<Language, StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO languages (code, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(code) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
        )
        .bind(code)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let language = sqlx::query_as("SELECT id, code, name FROM languages WHERE code = ?1")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;
        Ok(language)
    }

    pub async fn language_exists(&self, id: i64) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM languages WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Delete a language together with all of its translations
    pub async fn delete_language(&self, id: i64) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query("DELETE FROM languages WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }

    // ==================== Tags ====================

    pub async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let tags = sqlx::query_as("SELECT id, name FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn find_or_create_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO tags (name, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let tag = sqlx::query_as("SELECT id, name FROM tags WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(tag)
    }

    /// Return the ids from `ids` that do not name an existing tag
    pub async fn missing_tag_ids(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT id FROM tags WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let found: Vec<i64> = query.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }
}

async fn insert_tag_links(
    tx: &mut Transaction<'_, Sqlite>,
    translation_id: i64,
    tag_ids: &[i64],
) -> Result<(), StoreError> {
    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO tag_translation (translation_id, tag_id) VALUES (?1, ?2)")
            .bind(translation_id)
            .bind(*tag_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Append the WHERE clause for `filters`
fn push_filters<'a>(query: &mut QueryBuilder<'a, Sqlite>, filters: &'a SearchFilters) {
    query.push(" WHERE 1 = 1");

    if let Some(locale) = &filters.locale {
        query.push(" AND t.locale = ").push_bind(locale.as_str());
    }
    if let Some(key) = &filters.key {
        query
            .push(r#" AND t."key" LIKE "#)
            .push_bind(like_pattern(key))
            .push(r" ESCAPE '\'");
    }
    if let Some(content) = &filters.content {
        query
            .push(" AND t.content LIKE ")
            .push_bind(like_pattern(content))
            .push(r" ESCAPE '\'");
    }
    if let Some(tag_ids) = &filters.tags {
        query.push(
            " AND EXISTS (SELECT 1 FROM tag_translation tt
                WHERE tt.translation_id = t.id AND tt.tag_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in tag_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated("))");
    }
    if let Some(tag_names) = &filters.tag_names {
        query.push(
            " AND EXISTS (SELECT 1 FROM tag_translation tt
                JOIN tags g ON g.id = tt.tag_id
                WHERE tt.translation_id = t.id AND g.name IN (",
        );
        let mut names = query.separated(", ");
        for name in tag_names {
            names.push_bind(name.as_str());
        }
        names.push_unseparated("))");
    }
}

/// Unanchored LIKE pattern matching `needle` literally
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateTranslation, UpdateTranslation};
    use std::collections::HashSet;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    /// Create a temporary database for testing
    async fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_translations.db");
        let url = format!("sqlite://{}", db_path.display());
        let db = Database::new(&url).await.expect("Failed to create database");
        (db, temp_dir)
    }

    fn new_translation(locale: &str, name: &str, content: &str, tags: Vec<i64>) -> NewTranslation {
        NewTranslation::new(CreateTranslation {
            content: Some(content.to_string()),
            locale: Some(locale.to_string()),
            name: Some(name.to_string()),
            tags: Some(tags),
            ..Default::default()
        })
        .expect("Valid translation")
    }

    async fn create(db: &Database, locale: &str, name: &str, content: &str, tags: Vec<i64>) -> Translation {
        db.create_translation(&new_translation(locale, name, content, tags))
            .await
            .expect("Should create")
    }

    fn search(pairs: &[(&str, &str)]) -> SearchParams {
        SearchParams::from_pairs(pairs.iter().copied(), 50, 500).expect("Valid params")
    }

    fn keys(page: &Page<Translation>) -> Vec<&str> {
        page.data.iter().map(|t| t.key.as_str()).collect()
    }

    // ==================== Database Initialization Tests ====================

    #[tokio::test]
    async fn test_database_creation() {
        let (db, _temp_dir) = create_test_db().await;

        let page = db.search_translations(&search(&[])).await.expect("Should search");
        assert_eq!(page.total, 0);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn test_database_reopening() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", temp_dir.path().join("test.db").display());

        {
            let db = Database::new(&url).await.expect("Failed to create database");
            create(&db, "en", "Welcome", "Hi", vec![]).await;
        }

        {
            let db = Database::new(&url).await.expect("Failed to reopen database");
            let page = db.search_translations(&search(&[])).await.unwrap();
            assert_eq!(page.total, 1, "Translation should persist");
        }
    }

    #[tokio::test]
    async fn test_invalid_database_path() {
        let result = Database::new("sqlite:///non/existent/path/db.db").await;
        assert!(result.is_err());
    }

    // ==================== Create Tests ====================

    #[tokio::test]
    async fn test_create_translation_with_relations() {
        let (db, _temp_dir) = create_test_db().await;
        let english = db.upsert_language("en", "English").await.unwrap();
        let web = db.find_or_create_tag("web").await.unwrap();
        let mobile = db.find_or_create_tag("mobile").await.unwrap();

        let mut new = new_translation("en", "Welcome Message", "Welcome", vec![web.id, mobile.id]);
        new.fields.language_id = Some(english.id);
        let created = db.create_translation(&new).await.expect("Should create");

        assert_eq!(created.key, "en.welcome_message");
        assert_eq!(created.language, Some(english));
        let tag_names: Vec<&str> = created.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["web", "mobile"]);
    }

    #[tokio::test]
    async fn test_duplicate_key_and_locale_is_rejected() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;

        let result = db
            .create_translation(&new_translation("en", "welcome", "Hello again", vec![]))
            .await;

        match result {
            Err(StoreError::DuplicateKey { key, locale }) => {
                assert_eq!(key, "en.welcome");
                assert_eq!(locale, "en");
            }
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }

        // The original row is untouched
        let export = db.export_locale("en").await.unwrap();
        assert_eq!(export.get("en.welcome").map(String::as_str), Some("Hi"));
    }

    #[tokio::test]
    async fn test_same_key_in_other_locale_is_allowed() {
        let (db, _temp_dir) = create_test_db().await;
        let mut first = new_translation("en", "x", "A", vec![]);
        first.fields.key = "shared".to_string();
        let mut second = new_translation("fr", "x", "B", vec![]);
        second.fields.key = "shared".to_string();

        db.create_translation(&first).await.expect("first");
        db.create_translation(&second).await.expect("second");
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_tag_links() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;
        let web = db.find_or_create_tag("web").await.unwrap();

        let _ = db
            .create_translation(&new_translation("en", "Welcome", "dup", vec![web.id]))
            .await;

        let page = db.search_translations(&search(&[("tags", web.id.to_string().as_str())])).await.unwrap();
        assert_eq!(page.total, 0);
    }

    // ==================== Update Tests ====================

    #[tokio::test]
    async fn test_update_replaces_tags_wholesale() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let mobile = db.find_or_create_tag("mobile").await.unwrap();
        let desktop = db.find_or_create_tag("desktop").await.unwrap();
        let created = create(&db, "en", "Welcome", "Hi", vec![web.id, mobile.id]).await;

        let changes = TranslationChanges::new(UpdateTranslation {
            tags: Some(vec![desktop.id]),
            ..Default::default()
        })
        .unwrap();
        let updated = db
            .update_translation(created.id, &changes)
            .await
            .unwrap()
            .expect("Should exist");

        assert_eq!(updated.tags, vec![desktop]);
    }

    #[tokio::test]
    async fn test_update_without_tags_keeps_them() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let created = create(&db, "en", "Welcome", "Hi", vec![web.id]).await;

        let changes = TranslationChanges::new(UpdateTranslation {
            content: Some("Hello".to_string()),
            ..Default::default()
        })
        .unwrap();
        let updated = db.update_translation(created.id, &changes).await.unwrap().unwrap();

        assert_eq!(updated.content, "Hello");
        assert_eq!(updated.tags, vec![web]);
        assert_eq!(updated.key, "en.welcome");
    }

    #[tokio::test]
    async fn test_update_with_empty_tags_clears_them() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let created = create(&db, "en", "Welcome", "Hi", vec![web.id]).await;

        let changes = TranslationChanges::new(UpdateTranslation {
            tags: Some(vec![]),
            ..Default::default()
        })
        .unwrap();
        let updated = db.update_translation(created.id, &changes).await.unwrap().unwrap();
        assert!(updated.tags.is_empty());
    }

    #[tokio::test]
    async fn test_update_rederives_key() {
        let (db, _temp_dir) = create_test_db().await;
        let created = create(&db, "en", "Welcome", "Hi", vec![]).await;

        let changes = TranslationChanges::new(UpdateTranslation {
            locale: Some("fr".to_string()),
            name: Some("Bienvenue".to_string()),
            ..Default::default()
        })
        .unwrap();
        let updated = db.update_translation(created.id, &changes).await.unwrap().unwrap();
        assert_eq!(updated.key, "fr.bienvenue");
        assert_eq!(updated.locale, "fr");
    }

    #[tokio::test]
    async fn test_update_into_duplicate_is_rejected() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;
        let other = create(&db, "en", "Goodbye", "Bye", vec![]).await;

        let changes = TranslationChanges::new(UpdateTranslation {
            name: Some("Welcome".to_string()),
            ..Default::default()
        })
        .unwrap();
        let result = db.update_translation(other.id, &changes).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
    }

    #[tokio::test]
    async fn test_update_nonexistent_returns_none() {
        let (db, _temp_dir) = create_test_db().await;
        let result = db
            .update_translation(999, &TranslationChanges::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_partial_updates_keep_both_fields() {
        let (db, _temp_dir) = create_test_db().await;
        let created = create(&db, "en", "Welcome", "Hi", vec![]).await;

        let rename = TranslationChanges::new(UpdateTranslation {
            name: Some("Greeting".to_string()),
            ..Default::default()
        })
        .unwrap();
        let reword = TranslationChanges::new(UpdateTranslation {
            content: Some("Hello there".to_string()),
            ..Default::default()
        })
        .unwrap();

        let (first, second) = tokio::join!(
            db.update_translation(created.id, &rename),
            db.update_translation(created.id, &reword),
        );
        assert!(first.unwrap().is_some());
        assert!(second.unwrap().is_some());

        let stored = db.get_translation(created.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Greeting");
        assert_eq!(stored.key, "en.greeting");
        assert_eq!(stored.content, "Hello there");
    }

    #[tokio::test]
    async fn test_update_can_clear_language() {
        let (db, _temp_dir) = create_test_db().await;
        let english = db.upsert_language("en", "English").await.unwrap();
        let mut new = new_translation("en", "Welcome", "Hi", vec![]);
        new.fields.language_id = Some(english.id);
        let created = db.create_translation(&new).await.unwrap();

        let changes = TranslationChanges::new(UpdateTranslation {
            language_id: Some(None),
            ..Default::default()
        })
        .unwrap();
        let updated = db.update_translation(created.id, &changes).await.unwrap().unwrap();

        assert_eq!(updated.language_id, None);
        assert_eq!(updated.language, None);
    }

    // ==================== Delete Tests ====================

    #[tokio::test]
    async fn test_delete_translation() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let created = create(&db, "en", "Welcome", "Hi", vec![web.id]).await;

        assert!(db.delete_translation(created.id).await.unwrap());
        assert!(db.get_translation(created.id).await.unwrap().is_none());

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag_translation")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(links, 0, "Tag links should cascade");
    }

    #[tokio::test]
    async fn test_delete_nonexistent_returns_false() {
        let (db, _temp_dir) = create_test_db().await;
        assert!(!db.delete_translation(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_language_cascades_to_translations() {
        let (db, _temp_dir) = create_test_db().await;
        let french = db.upsert_language("fr", "French").await.unwrap();
        let mut new = new_translation("fr", "Bonjour", "Bonjour", vec![]);
        new.fields.language_id = Some(french.id);
        db.create_translation(&new).await.unwrap();
        create(&db, "en", "Hello", "Hello", vec![]).await;

        assert!(db.delete_language(french.id).await.unwrap());
        assert!(db.export_locale("fr").await.unwrap().is_empty());
        assert_eq!(db.export_locale("en").await.unwrap().len(), 1);
    }

    // ==================== Search Tests ====================

    #[tokio::test]
    async fn test_search_by_locale() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;
        create(&db, "fr", "Welcome", "Salut", vec![]).await;

        let page = db.search_translations(&search(&[("locale", "en")])).await.unwrap();
        assert_eq!(keys(&page), vec!["en.welcome"]);
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_search_key_and_content_are_substrings() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome Banner", "Hello there", vec![]).await;
        create(&db, "en", "Goodbye", "See you", vec![]).await;

        let by_key = db.search_translations(&search(&[("key", "come_ban")])).await.unwrap();
        assert_eq!(keys(&by_key), vec!["en.welcome_banner"]);

        let by_content = db.search_translations(&search(&[("content", "lo th")])).await.unwrap();
        assert_eq!(keys(&by_content), vec!["en.welcome_banner"]);
    }

    #[tokio::test]
    async fn test_search_like_wildcards_are_literal() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Discount", "50% off", vec![]).await;
        create(&db, "en", "Other", "500 items", vec![]).await;

        let page = db.search_translations(&search(&[("content", "0%")])).await.unwrap();
        assert_eq!(keys(&page), vec!["en.discount"]);

        let page = db.search_translations(&search(&[("key", "_")])).await.unwrap();
        assert_eq!(page.total, 0, "underscore must not act as a wildcard");
    }

    #[tokio::test]
    async fn test_search_tag_ids_match_any() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let mobile = db.find_or_create_tag("mobile").await.unwrap();
        let desktop = db.find_or_create_tag("desktop").await.unwrap();
        create(&db, "en", "A", "a", vec![web.id]).await;
        create(&db, "en", "B", "b", vec![mobile.id]).await;
        create(&db, "en", "C", "c", vec![desktop.id]).await;
        create(&db, "en", "D", "d", vec![web.id, mobile.id]).await;

        let ids = format!("{},{}", web.id, mobile.id);
        let page = db.search_translations(&search(&[("tags", ids.as_str())])).await.unwrap();
        assert_eq!(keys(&page), vec!["en.a", "en.b", "en.d"]);
    }

    #[tokio::test]
    async fn test_search_tag_names() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let mobile = db.find_or_create_tag("mobile").await.unwrap();
        create(&db, "en", "A", "a", vec![web.id]).await;
        create(&db, "en", "B", "b", vec![mobile.id]).await;
        create(&db, "en", "C", "c", vec![]).await;

        let page = db
            .search_translations(&search(&[("tag_names[]", "mobile")]))
            .await
            .unwrap();
        assert_eq!(keys(&page), vec!["en.b"]);
    }

    #[tokio::test]
    async fn test_search_filters_combine_with_and() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        create(&db, "en", "Welcome", "Hi", vec![web.id]).await;
        create(&db, "fr", "Welcome", "Salut", vec![web.id]).await;
        create(&db, "en", "Welcome Back", "Hi again", vec![]).await;

        let page = db
            .search_translations(&search(&[
                ("locale", "en"),
                ("key", "welcome"),
                ("tag_names", "web"),
            ]))
            .await
            .unwrap();
        assert_eq!(keys(&page), vec!["en.welcome"]);
    }

    #[tokio::test]
    async fn test_search_resolves_language() {
        let (db, _temp_dir) = create_test_db().await;
        let english = db.upsert_language("en", "English").await.unwrap();
        let mut new = new_translation("en", "Welcome", "Hi", vec![]);
        new.fields.language_id = Some(english.id);
        db.create_translation(&new).await.unwrap();

        let page = db.search_translations(&search(&[])).await.unwrap();
        assert_eq!(page.data[0].language, Some(english));
    }

    #[tokio::test]
    async fn test_search_no_match_is_empty_page() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;

        let page = db.search_translations(&search(&[("locale", "de")])).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.last_page, 1);
    }

    #[tokio::test]
    async fn test_pagination_covers_every_row_once() {
        let (db, _temp_dir) = create_test_db().await;
        for i in 0..23 {
            create(&db, "en", &format!("item {}", i), "x", vec![]).await;
        }
        create(&db, "fr", "item", "x", vec![]).await;

        let per_page = 5;
        let first = db
            .search_translations(&search(&[("locale", "en"), ("per_page", "5")]))
            .await
            .unwrap();
        assert_eq!(first.total, 23);
        assert_eq!(first.last_page, 5);

        let mut seen = HashSet::new();
        let mut count = 0;
        for page in 1..=first.last_page {
            let page_str = page.to_string();
            let result = db
                .search_translations(&search(&[
                    ("locale", "en"),
                    ("per_page", "5"),
                    ("page", page_str.as_str()),
                ]))
                .await
                .unwrap();
            assert!(result.data.len() <= per_page);
            for t in result.data {
                count += 1;
                assert!(seen.insert(t.id), "Duplicate row {}", t.id);
            }
        }
        assert_eq!(count, 23);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;

        let page = db.search_translations(&search(&[("page", "9")])).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.current_page, 9);
    }

    // ==================== Export Tests ====================

    #[tokio::test]
    async fn test_export_scope_and_order() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;
        create(&db, "fr", "Welcome", "Salut", vec![]).await;
        create(&db, "en", "Bye", "Bye", vec![]).await;

        let export = db.export_locale("en").await.unwrap();
        let entries: Vec<(&str, &str)> = export.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(entries, vec![("en.bye", "Bye"), ("en.welcome", "Hi")]);
    }

    #[tokio::test]
    async fn test_export_unknown_locale_is_empty() {
        let (db, _temp_dir) = create_test_db().await;
        create(&db, "en", "Welcome", "Hi", vec![]).await;
        assert!(db.export_locale("de").await.unwrap().is_empty());
    }

    // ==================== Reference Data Tests ====================

    #[tokio::test]
    async fn test_upsert_language_renames() {
        let (db, _temp_dir) = create_test_db().await;
        let first = db.upsert_language("en", "Englsh").await.unwrap();
        let second = db.upsert_language("en", "English").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "English");
        assert_eq!(db.list_languages().await.unwrap().len(), 1);
        assert!(db.language_exists(first.id).await.unwrap());
        assert!(!db.language_exists(first.id + 100).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_or_create_tag_is_idempotent() {
        let (db, _temp_dir) = create_test_db().await;
        let a = db.find_or_create_tag("web").await.unwrap();
        let b = db.find_or_create_tag("web").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(db.list_tags().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_missing_tag_ids() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();

        assert!(db.missing_tag_ids(&[]).await.unwrap().is_empty());
        assert_eq!(db.missing_tag_ids(&[web.id, 777]).await.unwrap(), vec![777]);
    }

    #[tokio::test]
    async fn test_insert_translations_batch() {
        let (db, _temp_dir) = create_test_db().await;
        let web = db.find_or_create_tag("web").await.unwrap();
        let rows: Vec<(TranslationFields, Vec<i64>)> = (0..10)
            .map(|i| (new_translation("en", &format!("n{}", i), "c", vec![]).fields, vec![web.id]))
            .collect();

        assert_eq!(db.insert_translations(&rows).await.unwrap(), 10);
        let page = db.search_translations(&search(&[("tag_names", "web")])).await.unwrap();
        assert_eq!(page.total, 10);
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%"), r"%50\%%");
        assert_eq!(like_pattern("a_b"), r"%a\_b%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }
}
