// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Catalog Backend
//!
//! `Catalog` implementation over a single SQLite connection. Reads and
//! writes are masked: a `get` selects only the columns named by the
//! caller's mask, and a write touches only the columns masked in the
//! record, so concurrent pipeline stages never clobber fields they did
//! not fetch.
//!
//! Mutations are batched into transactions of `batch_size` statements to
//! amortize fsync cost on the journal's sustained event rate;
//! `force_commit(true)` flushes the open transaction and pins autocommit
//! until forced mode is cleared (the scan sweep runs this way so the
//! reclaim is durable before the scanner is notified).
//!
//! All statements share one connection behind a mutex; SQLite locks the
//! whole store for writes anyway, which is why deployments on this
//! backend cap the DB-apply stage to a single thread.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Connection, Row, SqliteConnection};
use std::path::Path;
use tokio::sync::Mutex;

use hsm_pipeline_domain::{
    AttrMask, Catalog, CatalogFilter, EntryAttributes, EntryId, HsmStatus, PipelineError,
    StripeInfo, StripeItem,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS entries (
        id_seq INTEGER NOT NULL,
        id_oid INTEGER NOT NULL,
        fullpath TEXT,
        name TEXT,
        owner TEXT,
        grp TEXT,
        size INTEGER,
        blocks INTEGER,
        last_access INTEGER,
        last_mod INTEGER,
        creation_time INTEGER,
        md_update INTEGER,
        path_update INTEGER,
        status INTEGER,
        no_release INTEGER,
        no_archive INTEGER,
        last_archive INTEGER,
        last_restore INTEGER,
        release_class TEXT,
        archive_class TEXT,
        rel_cl_update INTEGER,
        arch_cl_update INTEGER,
        last_op_index INTEGER,
        archive_count INTEGER NOT NULL DEFAULT 0,
        restore_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (id_seq, id_oid)
    )",
    "CREATE INDEX IF NOT EXISTS idx_entries_md_update ON entries (md_update)",
    "CREATE TABLE IF NOT EXISTS stripe_info (
        id_seq INTEGER NOT NULL,
        id_oid INTEGER NOT NULL,
        stripe_count INTEGER NOT NULL,
        stripe_size INTEGER NOT NULL,
        pool TEXT NOT NULL,
        PRIMARY KEY (id_seq, id_oid)
    )",
    "CREATE TABLE IF NOT EXISTS stripe_items (
        id_seq INTEGER NOT NULL,
        id_oid INTEGER NOT NULL,
        item_index INTEGER NOT NULL,
        target INTEGER NOT NULL,
        PRIMARY KEY (id_seq, id_oid, item_index)
    )",
    "CREATE TABLE IF NOT EXISTS soft_rm (
        id_seq INTEGER NOT NULL,
        id_oid INTEGER NOT NULL,
        fullpath TEXT,
        rm_time INTEGER NOT NULL,
        PRIMARY KEY (id_seq, id_oid)
    )",
    "CREATE TABLE IF NOT EXISTS vars (
        name TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

/// Mask bit → `entries` column, for building masked selects.
const ENTRY_COLUMNS: &[(AttrMask, &str)] = &[
    (AttrMask::FULLPATH, "fullpath"),
    (AttrMask::NAME, "name"),
    (AttrMask::OWNER, "owner"),
    (AttrMask::GROUP, "grp"),
    (AttrMask::SIZE, "size"),
    (AttrMask::BLOCKS, "blocks"),
    (AttrMask::LAST_ACCESS, "last_access"),
    (AttrMask::LAST_MOD, "last_mod"),
    (AttrMask::CREATION_TIME, "creation_time"),
    (AttrMask::MD_UPDATE, "md_update"),
    (AttrMask::PATH_UPDATE, "path_update"),
    (AttrMask::STATUS, "status"),
    (AttrMask::NO_RELEASE, "no_release"),
    (AttrMask::NO_ARCHIVE, "no_archive"),
    (AttrMask::LAST_ARCHIVE, "last_archive"),
    (AttrMask::LAST_RESTORE, "last_restore"),
    (AttrMask::RELEASE_CLASS, "release_class"),
    (AttrMask::ARCHIVE_CLASS, "archive_class"),
    (AttrMask::REL_CL_UPDATE, "rel_cl_update"),
    (AttrMask::ARCH_CL_UPDATE, "arch_cl_update"),
    (AttrMask::LAST_OP_INDEX, "last_op_index"),
    (AttrMask::ARCHIVE_COUNT, "archive_count"),
    (AttrMask::RESTORE_COUNT, "restore_count"),
];

fn db_err(err: sqlx::Error) -> PipelineError {
    PipelineError::database_error(err.to_string())
}

/// One bound value for a dynamically built statement.
enum Bind {
    Text(String),
    Int(i64),
}

struct CatalogConn {
    conn: SqliteConnection,
    batch_size: u32,
    in_txn: bool,
    pending: u32,
    forced: bool,
}

impl CatalogConn {
    /// Opens a batching transaction if one is due.
    async fn begin_if_batching(&mut self) -> Result<(), sqlx::Error> {
        if !self.forced && self.batch_size > 1 && !self.in_txn {
            sqlx::query("BEGIN").execute(&mut self.conn).await?;
            self.in_txn = true;
            self.pending = 0;
        }
        Ok(())
    }

    /// Counts one mutation and commits the open transaction when the
    /// batch is full (or forced mode was entered mid-batch).
    async fn commit_if_due(&mut self) -> Result<(), sqlx::Error> {
        if self.in_txn {
            self.pending += 1;
            if self.forced || self.pending >= self.batch_size {
                self.flush().await?;
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), sqlx::Error> {
        if self.in_txn {
            sqlx::query("COMMIT").execute(&mut self.conn).await?;
            self.in_txn = false;
            self.pending = 0;
        }
        Ok(())
    }
}

/// SQLite-backed namespace-mirror catalog.
pub struct SqliteCatalog {
    inner: Mutex<CatalogConn>,
}

impl SqliteCatalog {
    /// Opens (creating if missing) a catalog database file.
    pub async fn from_file(path: &Path, batch_size: u32) -> Result<Self, PipelineError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(db_err)?;
        Self::init(conn, batch_size).await
    }

    /// In-memory catalog, for tests and tooling.
    pub async fn in_memory() -> Result<Self, PipelineError> {
        let conn = SqliteConnection::connect("sqlite::memory:")
            .await
            .map_err(db_err)?;
        Self::init(conn, 1).await
    }

    async fn init(mut conn: SqliteConnection, batch_size: u32) -> Result<Self, PipelineError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut conn)
                .await
                .map_err(db_err)?;
        }
        Ok(Self {
            inner: Mutex::new(CatalogConn {
                conn,
                batch_size: batch_size.max(1),
                in_txn: false,
                pending: 0,
                forced: false,
            }),
        })
    }

    fn row_to_attrs(row: &SqliteRow, mask: AttrMask) -> Result<EntryAttributes, sqlx::Error> {
        let mut attrs = EntryAttributes::new();

        macro_rules! read_fields {
            ($($bit:ident => $col:literal, $ty:ty, $setter:ident, $conv:expr;)+) => {
                $(
                    if mask.contains(AttrMask::$bit) {
                        if let Some(value) = row.try_get::<Option<$ty>, _>($col)? {
                            #[allow(clippy::redundant_closure_call)]
                            attrs.$setter(($conv)(value));
                        }
                    }
                )+
            };
        }

        read_fields!(
            FULLPATH => "fullpath", String, set_fullpath, |v: String| v;
            NAME => "name", String, set_name, |v: String| v;
            OWNER => "owner", String, set_owner, |v: String| v;
            GROUP => "grp", String, set_group, |v: String| v;
            SIZE => "size", i64, set_size, |v: i64| v as u64;
            BLOCKS => "blocks", i64, set_blocks, |v: i64| v as u64;
            LAST_ACCESS => "last_access", i64, set_last_access, |v: i64| v;
            LAST_MOD => "last_mod", i64, set_last_mod, |v: i64| v;
            CREATION_TIME => "creation_time", i64, set_creation_time, |v: i64| v;
            MD_UPDATE => "md_update", i64, set_md_update, |v: i64| v;
            PATH_UPDATE => "path_update", i64, set_path_update, |v: i64| v;
            STATUS => "status", i64, set_status, HsmStatus::from_db_code;
            NO_RELEASE => "no_release", i64, set_no_release, |v: i64| v != 0;
            NO_ARCHIVE => "no_archive", i64, set_no_archive, |v: i64| v != 0;
            LAST_ARCHIVE => "last_archive", i64, set_last_archive, |v: i64| v;
            LAST_RESTORE => "last_restore", i64, set_last_restore, |v: i64| v;
            RELEASE_CLASS => "release_class", String, set_release_class, |v: String| v;
            ARCHIVE_CLASS => "archive_class", String, set_archive_class, |v: String| v;
            REL_CL_UPDATE => "rel_cl_update", i64, set_rel_cl_update, |v: i64| v;
            ARCH_CL_UPDATE => "arch_cl_update", i64, set_arch_cl_update, |v: i64| v;
            LAST_OP_INDEX => "last_op_index", i64, set_last_op_index, |v: i64| v as u64;
            ARCHIVE_COUNT => "archive_count", i64, set_archive_count, |v: i64| v as u32;
            RESTORE_COUNT => "restore_count", i64, set_restore_count, |v: i64| v as u32;
        );

        Ok(attrs)
    }

    fn collect_bindings(attrs: &EntryAttributes) -> Vec<(&'static str, Bind)> {
        let mut out = Vec::new();

        macro_rules! bind_fields {
            ($($getter:ident => $col:literal, $conv:expr;)+) => {
                $(
                    if let Some(value) = attrs.$getter() {
                        #[allow(clippy::redundant_closure_call)]
                        out.push(($col, ($conv)(value)));
                    }
                )+
            };
        }

        bind_fields!(
            fullpath => "fullpath", |v: &str| Bind::Text(v.to_owned());
            name => "name", |v: &str| Bind::Text(v.to_owned());
            owner => "owner", |v: &str| Bind::Text(v.to_owned());
            group => "grp", |v: &str| Bind::Text(v.to_owned());
            size => "size", |v: u64| Bind::Int(v as i64);
            blocks => "blocks", |v: u64| Bind::Int(v as i64);
            last_access => "last_access", Bind::Int;
            last_mod => "last_mod", Bind::Int;
            creation_time => "creation_time", Bind::Int;
            md_update => "md_update", Bind::Int;
            path_update => "path_update", Bind::Int;
            status => "status", |v: HsmStatus| Bind::Int(v.as_db_code());
            no_release => "no_release", |v: bool| Bind::Int(v as i64);
            no_archive => "no_archive", |v: bool| Bind::Int(v as i64);
            last_archive => "last_archive", Bind::Int;
            last_restore => "last_restore", Bind::Int;
            release_class => "release_class", |v: &str| Bind::Text(v.to_owned());
            archive_class => "archive_class", |v: &str| Bind::Text(v.to_owned());
            rel_cl_update => "rel_cl_update", Bind::Int;
            arch_cl_update => "arch_cl_update", Bind::Int;
            last_op_index => "last_op_index", |v: u64| Bind::Int(v as i64);
            archive_count => "archive_count", |v: u32| Bind::Int(v as i64);
            restore_count => "restore_count", |v: u32| Bind::Int(v as i64);
        );

        out
    }

    /// Upserts the masked fields, then rewrites the striping tables when
    /// the record carries stripe info.
    async fn upsert_masked(
        conn: &mut SqliteConnection,
        id: &EntryId,
        attrs: &EntryAttributes,
    ) -> Result<(), sqlx::Error> {
        let bindings = Self::collect_bindings(attrs);

        let sql = if bindings.is_empty() {
            "INSERT INTO entries (id_seq, id_oid) VALUES (?, ?) \
             ON CONFLICT(id_seq, id_oid) DO NOTHING"
                .to_string()
        } else {
            let mut cols = vec!["id_seq", "id_oid"];
            let mut marks = vec!["?", "?"];
            let mut updates = Vec::new();
            for (col, _) in &bindings {
                cols.push(col);
                marks.push("?");
                updates.push(format!("{} = excluded.{}", col, col));
            }
            format!(
                "INSERT INTO entries ({}) VALUES ({}) \
                 ON CONFLICT(id_seq, id_oid) DO UPDATE SET {}",
                cols.join(", "),
                marks.join(", "),
                updates.join(", ")
            )
        };

        let mut query = sqlx::query(&sql)
            .bind(id.seq() as i64)
            .bind(id.oid() as i64);
        for (_, bind) in bindings {
            query = match bind {
                Bind::Text(v) => query.bind(v),
                Bind::Int(v) => query.bind(v),
            };
        }
        query.execute(&mut *conn).await?;

        if let Some(info) = attrs.stripe_info() {
            Self::write_stripe(conn, id, info, attrs.stripe_items().unwrap_or(&[])).await?;
        }

        Ok(())
    }

    async fn write_stripe(
        conn: &mut SqliteConnection,
        id: &EntryId,
        info: &StripeInfo,
        items: &[StripeItem],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO stripe_info \
             (id_seq, id_oid, stripe_count, stripe_size, pool) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.seq() as i64)
        .bind(id.oid() as i64)
        .bind(info.stripe_count as i64)
        .bind(info.stripe_size as i64)
        .bind(&info.pool)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM stripe_items WHERE id_seq = ? AND id_oid = ?")
            .bind(id.seq() as i64)
            .bind(id.oid() as i64)
            .execute(&mut *conn)
            .await?;

        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO stripe_items (id_seq, id_oid, item_index, target) VALUES (?, ?, ?, ?)",
            )
            .bind(id.seq() as i64)
            .bind(id.oid() as i64)
            .bind(index as i64)
            .bind(item.target as i64)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn read_stripe(
        conn: &mut SqliteConnection,
        id: &EntryId,
        mask: AttrMask,
        attrs: &mut EntryAttributes,
    ) -> Result<(), sqlx::Error> {
        let info_row = sqlx::query(
            "SELECT stripe_count, stripe_size, pool FROM stripe_info \
             WHERE id_seq = ? AND id_oid = ?",
        )
        .bind(id.seq() as i64)
        .bind(id.oid() as i64)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = info_row else {
            return Ok(());
        };

        if mask.contains(AttrMask::STRIPE_INFO) {
            attrs.set_stripe_info(StripeInfo {
                stripe_count: row.try_get::<i64, _>("stripe_count")? as u32,
                stripe_size: row.try_get::<i64, _>("stripe_size")? as u64,
                pool: row.try_get("pool")?,
            });
        }

        if mask.contains(AttrMask::STRIPE_ITEMS) {
            let rows = sqlx::query(
                "SELECT target FROM stripe_items \
                 WHERE id_seq = ? AND id_oid = ? ORDER BY item_index",
            )
            .bind(id.seq() as i64)
            .bind(id.oid() as i64)
            .fetch_all(&mut *conn)
            .await?;
            let items = rows
                .iter()
                .map(|row| {
                    Ok(StripeItem {
                        target: row.try_get::<i64, _>("target")? as u32,
                    })
                })
                .collect::<Result<Vec<_>, sqlx::Error>>()?;
            attrs.set_stripe_items(items);
        }

        Ok(())
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn get(
        &self,
        id: &EntryId,
        mask: AttrMask,
    ) -> Result<Option<EntryAttributes>, PipelineError> {
        let mut inner = self.inner.lock().await;

        let cols: Vec<&str> = ENTRY_COLUMNS
            .iter()
            .filter(|(bit, _)| mask.contains(*bit))
            .map(|(_, col)| *col)
            .collect();
        let selection = if cols.is_empty() {
            "1".to_string()
        } else {
            cols.join(", ")
        };
        let sql = format!(
            "SELECT {} FROM entries WHERE id_seq = ? AND id_oid = ?",
            selection
        );

        let row = sqlx::query(&sql)
            .bind(id.seq() as i64)
            .bind(id.oid() as i64)
            .fetch_optional(&mut inner.conn)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut attrs = Self::row_to_attrs(&row, mask).map_err(db_err)?;
        if mask.intersects(AttrMask::STRIPE_INFO | AttrMask::STRIPE_ITEMS) {
            Self::read_stripe(&mut inner.conn, id, mask, &mut attrs)
                .await
                .map_err(db_err)?;
        }
        Ok(Some(attrs))
    }

    async fn exists(&self, id: &EntryId) -> Result<bool, PipelineError> {
        let mut inner = self.inner.lock().await;
        let row = sqlx::query("SELECT 1 FROM entries WHERE id_seq = ? AND id_oid = ?")
            .bind(id.seq() as i64)
            .bind(id.oid() as i64)
            .fetch_optional(&mut inner.conn)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn check_stripe(&self, id: &EntryId) -> Result<bool, PipelineError> {
        let mut inner = self.inner.lock().await;
        let row = sqlx::query("SELECT 1 FROM stripe_info WHERE id_seq = ? AND id_oid = ?")
            .bind(id.seq() as i64)
            .bind(id.oid() as i64)
            .fetch_optional(&mut inner.conn)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn insert(&self, id: &EntryId, attrs: &EntryAttributes) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.begin_if_batching().await.map_err(db_err)?;
        Self::upsert_masked(&mut inner.conn, id, attrs)
            .await
            .map_err(db_err)?;
        inner.commit_if_due().await.map_err(db_err)
    }

    async fn update(&self, id: &EntryId, attrs: &EntryAttributes) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.begin_if_batching().await.map_err(db_err)?;
        Self::upsert_masked(&mut inner.conn, id, attrs)
            .await
            .map_err(db_err)?;
        inner.commit_if_due().await.map_err(db_err)
    }

    async fn remove(&self, id: &EntryId) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.begin_if_batching().await.map_err(db_err)?;
        for sql in [
            "DELETE FROM stripe_items WHERE id_seq = ? AND id_oid = ?",
            "DELETE FROM stripe_info WHERE id_seq = ? AND id_oid = ?",
            "DELETE FROM entries WHERE id_seq = ? AND id_oid = ?",
        ] {
            sqlx::query(sql)
                .bind(id.seq() as i64)
                .bind(id.oid() as i64)
                .execute(&mut inner.conn)
                .await
                .map_err(db_err)?;
        }
        inner.commit_if_due().await.map_err(db_err)
    }

    async fn soft_remove(
        &self,
        id: &EntryId,
        fullpath: Option<&str>,
        deadline: i64,
    ) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.begin_if_batching().await.map_err(db_err)?;
        for sql in [
            "DELETE FROM stripe_items WHERE id_seq = ? AND id_oid = ?",
            "DELETE FROM stripe_info WHERE id_seq = ? AND id_oid = ?",
            "DELETE FROM entries WHERE id_seq = ? AND id_oid = ?",
        ] {
            sqlx::query(sql)
                .bind(id.seq() as i64)
                .bind(id.oid() as i64)
                .execute(&mut inner.conn)
                .await
                .map_err(db_err)?;
        }
        sqlx::query(
            "INSERT OR REPLACE INTO soft_rm (id_seq, id_oid, fullpath, rm_time) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(id.seq() as i64)
        .bind(id.oid() as i64)
        .bind(fullpath)
        .bind(deadline)
        .execute(&mut inner.conn)
        .await
        .map_err(db_err)?;
        inner.commit_if_due().await.map_err(db_err)
    }

    async fn mass_remove(&self, filter: &CatalogFilter) -> Result<u64, PipelineError> {
        let CatalogFilter::MdUpdateBefore(threshold) = *filter;

        let mut inner = self.inner.lock().await;
        inner.begin_if_batching().await.map_err(db_err)?;
        for sql in [
            "DELETE FROM stripe_items WHERE (id_seq, id_oid) IN \
             (SELECT id_seq, id_oid FROM entries WHERE md_update < ?)",
            "DELETE FROM stripe_info WHERE (id_seq, id_oid) IN \
             (SELECT id_seq, id_oid FROM entries WHERE md_update < ?)",
        ] {
            sqlx::query(sql)
                .bind(threshold)
                .execute(&mut inner.conn)
                .await
                .map_err(db_err)?;
        }
        let result = sqlx::query("DELETE FROM entries WHERE md_update < ?")
            .bind(threshold)
            .execute(&mut inner.conn)
            .await
            .map_err(db_err)?;
        inner.commit_if_due().await.map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn set_var(&self, name: &str, value: &str) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.begin_if_batching().await.map_err(db_err)?;
        sqlx::query("INSERT OR REPLACE INTO vars (name, value) VALUES (?, ?)")
            .bind(name)
            .bind(value)
            .execute(&mut inner.conn)
            .await
            .map_err(db_err)?;
        inner.commit_if_due().await.map_err(db_err)
    }

    async fn get_var(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let mut inner = self.inner.lock().await;
        let row = sqlx::query("SELECT value FROM vars WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut inner.conn)
            .await
            .map_err(db_err)?;
        row.map(|row| row.try_get("value").map_err(db_err)).transpose()
    }

    async fn force_commit(&self, enable: bool) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        if enable {
            inner.flush().await.map_err(db_err)?;
        }
        inner.forced = enable;
        Ok(())
    }
}
