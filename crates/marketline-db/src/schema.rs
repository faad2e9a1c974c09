//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs and shop ids are stored as strings in record ids; shop ids are
//! stored as ints in foreign-key fields. Enums are stored as lowercase
//! strings with ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Sequences (numeric ids for shops)
-- =======================================================================
DEFINE TABLE _sequence SCHEMAFULL;
DEFINE FIELD value ON TABLE _sequence TYPE int DEFAULT 0;

-- =======================================================================
-- Shops (global scope)
-- =======================================================================
DEFINE TABLE shop SCHEMAFULL;
DEFINE FIELD name ON TABLE shop TYPE string;
DEFINE FIELD domain ON TABLE shop TYPE option<string>;
DEFINE FIELD status ON TABLE shop TYPE string \
    ASSERT $value IN ['active', 'suspended', 'pending'];
DEFINE FIELD platforms ON TABLE shop TYPE object FLEXIBLE;
DEFINE FIELD created_at ON TABLE shop TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE shop TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_shop_domain ON TABLE shop COLUMNS domain UNIQUE;

-- =======================================================================
-- Pricing plans (global scope)
-- =======================================================================
DEFINE TABLE pricing_plan SCHEMAFULL;
DEFINE FIELD name ON TABLE pricing_plan TYPE string;
DEFINE FIELD max_products ON TABLE pricing_plan TYPE option<int>;
DEFINE FIELD max_orders_per_month ON TABLE pricing_plan TYPE option<int>;
DEFINE FIELD max_api_requests_per_day ON TABLE pricing_plan \
    TYPE option<int>;
DEFINE FIELD features ON TABLE pricing_plan TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD web_enabled ON TABLE pricing_plan TYPE bool DEFAULT true;
DEFINE FIELD android_enabled ON TABLE pricing_plan TYPE bool \
    DEFAULT false;
DEFINE FIELD ios_enabled ON TABLE pricing_plan TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE pricing_plan TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Clients (one subscription holder per shop)
-- =======================================================================
DEFINE TABLE client SCHEMAFULL;
DEFINE FIELD shop_id ON TABLE client TYPE int;
DEFINE FIELD name ON TABLE client TYPE string;
DEFINE FIELD status ON TABLE client TYPE string \
    ASSERT $value IN ['trial', 'active', 'suspended', 'expired'];
DEFINE FIELD plan_id ON TABLE client TYPE string;
DEFINE FIELD subscription_end ON TABLE client TYPE option<string>;
DEFINE FIELD created_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_client_shop ON TABLE client COLUMNS shop_id UNIQUE;
DEFINE INDEX idx_client_status_end ON TABLE client \
    COLUMNS status, subscription_end;

-- =======================================================================
-- Audit Log (shop scope, append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD shop_id ON TABLE audit_log TYPE int;
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD detail ON TABLE audit_log TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_shop_time ON TABLE audit_log \
    COLUMNS shop_id, created_at;

-- =======================================================================
-- Catalog and checkout rows (only what quota counting reads)
-- =======================================================================
DEFINE TABLE product SCHEMAFULL;
DEFINE FIELD shop_id ON TABLE product TYPE int;
DEFINE FIELD name ON TABLE product TYPE option<string>;
DEFINE FIELD created_at ON TABLE product TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_product_shop ON TABLE product COLUMNS shop_id;

DEFINE TABLE shop_order SCHEMAFULL;
DEFINE FIELD shop_id ON TABLE shop_order TYPE int;
DEFINE FIELD created_at ON TABLE shop_order TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_shop_order_shop_time ON TABLE shop_order \
    COLUMNS shop_id, created_at;

-- =======================================================================
-- Request metrics (append-only, pruned by retention)
-- =======================================================================
DEFINE TABLE request_metric SCHEMAFULL;
DEFINE FIELD shop_id ON TABLE request_metric TYPE option<int>;
DEFINE FIELD user_id ON TABLE request_metric TYPE option<string>;
DEFINE FIELD method ON TABLE request_metric TYPE string;
DEFINE FIELD path ON TABLE request_metric TYPE string;
DEFINE FIELD route_name ON TABLE request_metric TYPE option<string>;
DEFINE FIELD status_code ON TABLE request_metric TYPE int;
DEFINE FIELD duration_ms ON TABLE request_metric TYPE int;
DEFINE FIELD is_error ON TABLE request_metric TYPE bool;
DEFINE FIELD exception_class ON TABLE request_metric \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE request_metric TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_request_metric_time ON TABLE request_metric \
    COLUMNS created_at;
DEFINE INDEX idx_request_metric_shop_time ON TABLE request_metric \
    COLUMNS shop_id, created_at;

-- =======================================================================
-- Alert dedupe locks (expire after the cool-down)
-- =======================================================================
DEFINE TABLE alert_lock SCHEMAFULL;
DEFINE FIELD claimant ON TABLE alert_lock TYPE string;
DEFINE FIELD expires_at ON TABLE alert_lock TYPE datetime;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
