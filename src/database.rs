// Blog database - SQLite persistence through an sqlx connection pool
// Read helpers take a plain connection so the same query runs on the pool or inside a transaction

use chrono::Utc;
use sqlx::{
    sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Transaction,
};
use std::str::FromStr;

use crate::entities::{EntArticle, EntCategory, EntComment, EntTag, EntUser, FromSqliteRow};
use crate::error::{AppError, AppResult};

const COMMENT_SELECT: &str = "SELECT c.id, c.article_id, c.author_id, COALESCE(u.username, '') AS author_name, \
     c.parent_id, c.content, c.created_at, c.updated_at \
     FROM comments c LEFT JOIN users u ON u.id = c.author_id";

const ARTICLE_SELECT: &str = "SELECT a.id, a.title, a.content, a.author_id, COALESCE(u.username, '') AS author_name, \
     a.created_at, a.updated_at \
     FROM articles a LEFT JOIN users u ON u.id = a.author_id";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        is_staff INTEGER NOT NULL DEFAULT 0,
        date_joined TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        slug TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_categories (
        article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        PRIMARY KEY (article_id, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_tags (
        article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (article_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        action_type TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        details TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_article_parent ON comments(article_id, parent_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_articles_created ON articles(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp)",
];

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Validation(format!("{}: {}", context, db_err.message()))
        }
        // a referenced user, article or parent row is gone
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            AppError::NotFound(format!("{}: referenced row does not exist", context))
        }
        other => AppError::Database(format!("{}: {}", context, other)),
    }
}

fn decode_rows<T: FromSqliteRow>(rows: Vec<SqliteRow>) -> AppResult<Vec<T>> {
    rows.iter()
        .map(|row| T::from_row(row).map_err(|e| db_error("Failed to decode row", e)))
        .collect()
}

fn decode_optional<T: FromSqliteRow>(row: Option<SqliteRow>) -> AppResult<Option<T>> {
    row.map(|row| T::from_row(&row).map_err(|e| db_error("Failed to decode row", e)))
        .transpose()
}

/// Names of linked categories/tags come back joined with this separator
const NAME_SEPARATOR: char = '\u{1f}';

/// Unicode-aware case-insensitive substring test. SQLite's `lower()` only
/// folds ASCII, so matching happens here rather than in SQL.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Searchable text of one article as read for `search_articles`
struct SearchCandidate {
    id: i64,
    fields: [String; 4],
}

impl SearchCandidate {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            fields: [
                row.try_get("title")?,
                row.try_get("content")?,
                row.try_get("category_names")?,
                row.try_get("tag_names")?,
            ],
        })
    }

    fn matches(&self, needle: &str) -> bool {
        self.fields.iter().any(|field| {
            field
                .split(NAME_SEPARATOR)
                .any(|value| contains_folded(value, needle))
        })
    }
}

/// Transaction wrapper; dropping it without `commit` rolls back
pub struct DatabaseTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl DatabaseTransaction {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }

    pub async fn rollback(self) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("Failed to rollback transaction", e))
    }
}

/// New article row plus its links
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
}

/// Partial article update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_ids: Option<Vec<i64>>,
    pub tag_ids: Option<Vec<i64>>,
}

/// One row of the activity log as stored
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_username: Option<String>,
    pub action_type: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub details: String,
}

#[derive(Debug, Clone, Copy)]
pub enum TaxonomyKind {
    Tag,
    Category,
}

impl TaxonomyKind {
    fn table(&self) -> &'static str {
        match self {
            TaxonomyKind::Tag => "tags",
            TaxonomyKind::Category => "categories",
        }
    }
}

pub struct BlogDatabase {
    pub pool: SqlitePool,
}

impl BlogDatabase {
    /// Connect and create the schema. In-memory databases are pinned to one
    /// long-lived connection, otherwise every pooled connection would see its own empty database.
    pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Configuration(format!("Invalid DATABASE_URL {}: {}", database_url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| db_error(&format!("Failed to connect to {}", database_url), e))?;

        let db = Self { pool };
        db.initialize().await?;
        tracing::info!(url = database_url, "database ready");
        Ok(db)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create tables and indexes; safe to run on every boot
    pub async fn initialize(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to initialize schema", e))?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Database health check failed", e))?;
        Ok(())
    }

    pub async fn begin_transaction(&self) -> AppResult<DatabaseTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;
        Ok(DatabaseTransaction { tx })
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))
    }

    // ---- users ----

    pub async fn get_user(&self, id: i64) -> AppResult<Option<EntUser>> {
        let row = sqlx::query("SELECT id, username, email, is_staff, date_joined FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get user {}", id), e))?;
        decode_optional(row)
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<Option<EntUser>> {
        let row = sqlx::query("SELECT id, username, email, is_staff, date_joined FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get user {}", username), e))?;
        decode_optional(row)
    }

    pub async fn list_users(&self) -> AppResult<Vec<EntUser>> {
        let rows = sqlx::query("SELECT id, username, email, is_staff, date_joined FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list users", e))?;
        decode_rows(rows)
    }

    pub async fn create_user(&self, username: &str, email: &str, is_staff: bool) -> AppResult<EntUser> {
        let result = sqlx::query("INSERT INTO users (username, email, is_staff, date_joined) VALUES (?, ?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind(is_staff)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to create user {}", username), e))?;

        let id = result.last_insert_rowid();
        self.get_user(id).await?.ok_or_else(|| {
            AppError::Internal(format!("User {} vanished right after insert", id))
        })
    }

    pub async fn update_user(&self, id: i64, email: Option<&str>, is_staff: Option<bool>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET email = COALESCE(?, email), is_staff = COALESCE(?, is_staff) WHERE id = ?",
        )
        .bind(email)
        .bind(is_staff)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to update user {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes the user; articles and comments go with it through the foreign keys
    pub async fn delete_user_tx(&self, tx: &mut DatabaseTransaction, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await
            .map_err(|e| db_error(&format!("Failed to delete user {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_rows(&self, table: &'static str) -> AppResult<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to count {}", table), e))?;
        row.try_get("total").map_err(|e| db_error("Failed to decode count", e))
    }

    // ---- articles ----

    async fn load_article_links(conn: &mut SqliteConnection, article: &mut EntArticle) -> AppResult<()> {
        article.category_ids = sqlx::query_scalar::<_, i64>(
            "SELECT category_id FROM article_categories WHERE article_id = ? ORDER BY category_id",
        )
        .bind(article.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to load article categories", e))?;

        article.tag_ids = sqlx::query_scalar::<_, i64>("SELECT tag_id FROM article_tags WHERE article_id = ? ORDER BY tag_id")
            .bind(article.id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to load article tags", e))?;
        Ok(())
    }

    async fn fetch_articles(conn: &mut SqliteConnection, rows: Vec<SqliteRow>) -> AppResult<Vec<EntArticle>> {
        let mut articles: Vec<EntArticle> = decode_rows(rows)?;
        for article in &mut articles {
            Self::load_article_links(conn, article).await?;
        }
        Ok(articles)
    }

    async fn get_article_on(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<EntArticle>> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?", ARTICLE_SELECT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| db_error(&format!("Failed to get article {}", id), e))?;
        match decode_optional::<EntArticle>(row)? {
            Some(mut article) => {
                Self::load_article_links(conn, &mut article).await?;
                Ok(Some(article))
            }
            None => Ok(None),
        }
    }

    pub async fn get_article(&self, id: i64) -> AppResult<Option<EntArticle>> {
        let mut conn = self.acquire().await?;
        Self::get_article_on(&mut conn, id).await
    }

    pub async fn article_exists(&self, id: i64) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to check article {}", id), e))?;
        Ok(row.is_some())
    }

    pub async fn list_articles(&self) -> AppResult<Vec<EntArticle>> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query(&format!("{} ORDER BY a.created_at DESC, a.id DESC", ARTICLE_SELECT))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to list articles", e))?;
        Self::fetch_articles(&mut conn, rows).await
    }

    /// Case-insensitive substring match on title, content, category name or
    /// tag name, newest first. Each article appears at most once.
    pub async fn search_articles(&self, query: &str) -> AppResult<Vec<EntArticle>> {
        let needle = query.to_lowercase();
        let mut conn = self.acquire().await?;
        let rows = sqlx::query(
            "SELECT a.id, a.title, a.content, \
                    COALESCE((SELECT group_concat(c.name, char(31)) FROM article_categories ac \
                              JOIN categories c ON c.id = ac.category_id \
                              WHERE ac.article_id = a.id), '') AS category_names, \
                    COALESCE((SELECT group_concat(t.name, char(31)) FROM article_tags at \
                              JOIN tags t ON t.id = at.tag_id \
                              WHERE at.article_id = a.id), '') AS tag_names \
             FROM articles a ORDER BY a.created_at DESC, a.id DESC",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to search articles", e))?;

        let mut articles = Vec::new();
        for row in &rows {
            let candidate = SearchCandidate::from_row(row).map_err(|e| db_error("Failed to decode search row", e))?;
            if !candidate.matches(&needle) {
                continue;
            }
            if let Some(article) = Self::get_article_on(&mut conn, candidate.id).await? {
                articles.push(article);
            }
        }
        Ok(articles)
    }

    async fn replace_links(
        conn: &mut SqliteConnection,
        article_id: i64,
        categories: Option<&[i64]>,
        tags: Option<&[i64]>,
    ) -> AppResult<()> {
        if let Some(category_ids) = categories {
            sqlx::query("DELETE FROM article_categories WHERE article_id = ?")
                .bind(article_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| db_error("Failed to clear article categories", e))?;
            for category_id in category_ids {
                sqlx::query("INSERT OR IGNORE INTO article_categories (article_id, category_id) VALUES (?, ?)")
                    .bind(article_id)
                    .bind(category_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| db_error("Failed to link category", e))?;
            }
        }
        if let Some(tag_ids) = tags {
            sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                .bind(article_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| db_error("Failed to clear article tags", e))?;
            for tag_id in tag_ids {
                sqlx::query("INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                    .bind(article_id)
                    .bind(tag_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| db_error("Failed to link tag", e))?;
            }
        }
        Ok(())
    }

    pub async fn create_article_tx(&self, tx: &mut DatabaseTransaction, article: &NewArticle) -> AppResult<EntArticle> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO articles (title, content, author_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.author_id)
        .bind(now)
        .bind(now)
        .execute(tx.conn())
        .await
        .map_err(|e| db_error("Failed to create article", e))?;

        let id = result.last_insert_rowid();
        Self::replace_links(tx.conn(), id, Some(article.category_ids.as_slice()), Some(article.tag_ids.as_slice())).await?;
        Self::get_article_on(tx.conn(), id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Article {} vanished right after insert", id)))
    }

    pub async fn update_article_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: i64,
        changes: &ArticleChanges,
    ) -> AppResult<Option<EntArticle>> {
        let result = sqlx::query(
            "UPDATE articles SET title = COALESCE(?, title), content = COALESCE(?, content), updated_at = ? WHERE id = ?",
        )
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(Utc::now())
        .bind(id)
        .execute(tx.conn())
        .await
        .map_err(|e| db_error(&format!("Failed to update article {}", id), e))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::replace_links(tx.conn(), id, changes.category_ids.as_deref(), changes.tag_ids.as_deref()).await?;
        Self::get_article_on(tx.conn(), id).await
    }

    pub async fn delete_article_tx(&self, tx: &mut DatabaseTransaction, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await
            .map_err(|e| db_error(&format!("Failed to delete article {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_article_tx(&self, tx: &mut DatabaseTransaction, id: i64) -> AppResult<Option<EntArticle>> {
        Self::get_article_on(tx.conn(), id).await
    }

    /// Ids from `ids` that have no row in the tag or category table
    pub async fn missing_taxonomy_ids(&self, kind: TaxonomyKind, ids: &[i64]) -> AppResult<Vec<i64>> {
        let mut missing = Vec::new();
        for id in ids {
            let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?", kind.table()))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to check taxonomy id", e))?;
            if row.is_none() {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    // ---- comments ----

    async fn get_comment_on(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<EntComment>> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(|e| db_error(&format!("Failed to get comment {}", id), e))?;
        decode_optional(row)
    }

    pub async fn get_comment(&self, id: i64) -> AppResult<Option<EntComment>> {
        let mut conn = self.acquire().await?;
        Self::get_comment_on(&mut conn, id).await
    }

    pub async fn get_comment_tx(&self, tx: &mut DatabaseTransaction, id: i64) -> AppResult<Option<EntComment>> {
        Self::get_comment_on(tx.conn(), id).await
    }

    pub async fn insert_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        article_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> AppResult<EntComment> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO comments (article_id, author_id, parent_id, content, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(author_id)
        .bind(parent_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(tx.conn())
        .await
        .map_err(|e| db_error("Failed to create comment", e))?;

        let id = result.last_insert_rowid();
        Self::get_comment_on(tx.conn(), id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Comment {} vanished right after insert", id)))
    }

    pub async fn update_comment_content(&self, id: i64, content: &str) -> AppResult<Option<EntComment>> {
        let mut conn = self.acquire().await?;
        let result = sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error(&format!("Failed to update comment {}", id), e))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::get_comment_on(&mut conn, id).await
    }

    /// Every comment of every article, oldest first
    pub async fn list_comments(&self) -> AppResult<Vec<EntComment>> {
        let rows = sqlx::query(&format!("{} ORDER BY c.created_at ASC, c.id ASC", COMMENT_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list comments", e))?;
        decode_rows(rows)
    }

    pub async fn list_root_comments(&self, article_id: i64) -> AppResult<Vec<EntComment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.article_id = ? AND c.parent_id IS NULL ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to list comments of article {}", article_id), e))?;
        decode_rows(rows)
    }

    pub async fn list_replies(&self, comment_id: i64) -> AppResult<Vec<EntComment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.parent_id = ? ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(comment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to list replies of comment {}", comment_id), e))?;
        decode_rows(rows)
    }

    pub async fn count_replies(&self, comment_id: i64) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE parent_id = ?")
            .bind(comment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to count replies of comment {}", comment_id), e))
    }

    /// The comment and all of its descendants, deepest first
    pub async fn comment_subtree_tx(&self, tx: &mut DatabaseTransaction, root_id: i64) -> AppResult<Vec<EntComment>> {
        let rows = sqlx::query(
            "WITH RECURSIVE subtree(id, depth) AS ( \
                 SELECT id, 0 FROM comments WHERE id = ? \
                 UNION ALL \
                 SELECT c.id, s.depth + 1 FROM comments c JOIN subtree s ON c.parent_id = s.id \
             ) \
             SELECT c.id, c.article_id, c.author_id, COALESCE(u.username, '') AS author_name, \
                    c.parent_id, c.content, c.created_at, c.updated_at \
             FROM subtree s \
             JOIN comments c ON c.id = s.id \
             LEFT JOIN users u ON u.id = c.author_id \
             ORDER BY s.depth DESC, c.id DESC",
        )
        .bind(root_id)
        .fetch_all(tx.conn())
        .await
        .map_err(|e| db_error(&format!("Failed to collect replies under comment {}", root_id), e))?;
        decode_rows(rows)
    }

    pub async fn article_comments_tx(&self, tx: &mut DatabaseTransaction, article_id: i64) -> AppResult<Vec<EntComment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.article_id = ? ORDER BY c.created_at DESC, c.id DESC",
            COMMENT_SELECT
        ))
        .bind(article_id)
        .fetch_all(tx.conn())
        .await
        .map_err(|e| db_error(&format!("Failed to collect comments of article {}", article_id), e))?;
        decode_rows(rows)
    }

    pub async fn delete_comment_tx(&self, tx: &mut DatabaseTransaction, id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await
            .map_err(|e| db_error(&format!("Failed to delete comment {}", id), e))?;
        Ok(result.rows_affected())
    }

    // ---- tags & categories ----

    pub async fn list_tags(&self) -> AppResult<Vec<EntTag>> {
        let rows = sqlx::query("SELECT id, name, slug FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list tags", e))?;
        decode_rows(rows)
    }

    pub async fn get_tag(&self, id: i64) -> AppResult<Option<EntTag>> {
        let row = sqlx::query("SELECT id, name, slug FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get tag {}", id), e))?;
        decode_optional(row)
    }

    pub async fn create_tag(&self, name: &str, slug: &str) -> AppResult<EntTag> {
        let result = sqlx::query("INSERT INTO tags (name, slug) VALUES (?, ?)")
            .bind(name)
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to create tag {}", name), e))?;
        let id = result.last_insert_rowid();
        self.get_tag(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Tag {} vanished right after insert", id)))
    }

    pub async fn update_tag(&self, id: i64, name: Option<&str>, slug: Option<&str>) -> AppResult<Option<EntTag>> {
        let result = sqlx::query("UPDATE tags SET name = COALESCE(?, name), slug = COALESCE(?, slug) WHERE id = ?")
            .bind(name)
            .bind(slug)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to update tag {}", id), e))?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_tag(id).await
    }

    pub async fn list_categories(&self) -> AppResult<Vec<EntCategory>> {
        let rows = sqlx::query(
            "SELECT id, name, description, slug, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list categories", e))?;
        decode_rows(rows)
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Option<EntCategory>> {
        let row = sqlx::query(
            "SELECT id, name, description, slug, created_at, updated_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to get category {}", id), e))?;
        decode_optional(row)
    }

    pub async fn create_category(&self, name: &str, description: Option<&str>, slug: &str) -> AppResult<EntCategory> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO categories (name, description, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(slug)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to create category {}", name), e))?;
        let id = result.last_insert_rowid();
        self.get_category(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Category {} vanished right after insert", id)))
    }

    pub async fn update_category(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        slug: Option<&str>,
    ) -> AppResult<Option<EntCategory>> {
        let result = sqlx::query(
            "UPDATE categories SET name = COALESCE(?, name), description = COALESCE(?, description), \
             slug = COALESCE(?, slug), updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(slug)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to update category {}", id), e))?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_category(id).await
    }

    /// Link rows go with the entity through the foreign keys
    pub async fn delete_taxonomy(&self, kind: TaxonomyKind, id: i64) -> AppResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to delete from {} {}", kind.table(), id), e))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- activity log ----

    pub async fn list_activity(&self, limit: i64) -> AppResult<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            "SELECT l.id, l.user_id, u.username AS user_username, l.action_type, l.timestamp, l.details \
             FROM activity_log l LEFT JOIN users u ON u.id = l.user_id \
             ORDER BY l.timestamp DESC, l.id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list activity log", e))?;

        rows.iter()
            .map(|row| {
                Ok(ActivityRecord {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    user_username: row.try_get("user_username")?,
                    action_type: row.try_get("action_type")?,
                    timestamp: row.try_get("timestamp")?,
                    details: row.try_get("details")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| db_error("Failed to decode activity log", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_matching_folds_unicode_case() {
        let candidate = SearchCandidate {
            id: 1,
            fields: [
                "Über Rust".to_string(),
                "body".to_string(),
                String::new(),
                format!("Async{}ÆRØ", NAME_SEPARATOR),
            ],
        };
        assert!(candidate.matches(&"über".to_lowercase()));
        assert!(candidate.matches(&"ÜBER".to_lowercase()));
        assert!(candidate.matches(&"ærø".to_lowercase()));
        assert!(!candidate.matches("100%"));
        // a match may not straddle two tag names
        assert!(!candidate.matches("asyncæ"));
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = BlogDatabase::new_in_memory().await.unwrap();
        db.initialize().await.unwrap();
        db.health_check().await.unwrap();
        assert_eq!(db.count_rows("comments").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_validation_error() {
        let db = BlogDatabase::new_in_memory().await.unwrap();
        db.create_user("alice", "a@example.com", false).await.unwrap();
        let err = db.create_user("alice", "other@example.com", false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
