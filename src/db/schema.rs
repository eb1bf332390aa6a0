use rusqlite::Connection;

/// Per-connection pragmas. Applied by the pool on every new connection.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets readers proceed while a webhook transaction holds the write lock
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        "#,
    )
}

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Customers (identity anchor, never deleted)
        -- aliases: JSON array, grows by set union
        -- attributes: JSON object of key -> {value, updated_at_ms}
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            app_user_id TEXT NOT NULL UNIQUE,
            original_app_user_id TEXT NOT NULL,
            aliases TEXT NOT NULL DEFAULT '[]',
            attributes TEXT NOT NULL DEFAULT '{}',
            first_seen_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_customers_original ON customers(original_app_user_id);

        -- Entitlements (soft-revoked via is_active = 0, never hard-deleted)
        CREATE TABLE IF NOT EXISTS entitlements (
            id TEXT PRIMARY KEY,
            app_user_id TEXT NOT NULL,
            entitlement_id TEXT NOT NULL,
            product_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            expires_at_ms INTEGER,                -- NULL = never expires
            purchased_at_ms INTEGER,
            store TEXT,
            is_sandbox INTEGER NOT NULL DEFAULT 0,
            billing_issue_detected_at INTEGER,    -- suspends the expiry check while set
            updated_at INTEGER NOT NULL,
            UNIQUE(app_user_id, entitlement_id)
        );
        CREATE INDEX IF NOT EXISTS idx_entitlements_user ON entitlements(app_user_id);

        -- Subscriptions (one row per purchase lineage)
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            original_transaction_id TEXT NOT NULL UNIQUE,
            transaction_id TEXT NOT NULL,
            app_user_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            entitlement_ids TEXT,                 -- JSON array
            store TEXT NOT NULL,
            environment TEXT NOT NULL CHECK (environment IN ('SANDBOX', 'PRODUCTION')),
            period_type TEXT NOT NULL,
            purchased_at_ms INTEGER NOT NULL,
            expiration_at_ms INTEGER,
            is_family_share INTEGER NOT NULL DEFAULT 0,
            is_trial_conversion INTEGER,
            auto_renew_status INTEGER,
            cancel_reason TEXT,
            expiration_reason TEXT,
            grace_period_expiration_at_ms INTEGER,
            billing_issue_detected_at INTEGER,
            auto_resume_at_ms INTEGER,
            new_product_id TEXT,
            price_usd REAL,
            currency TEXT,
            price_in_purchased_currency REAL,
            country_code TEXT,
            tax_percentage REAL,
            commission_percentage REAL,
            offer_code TEXT,
            presented_offering_id TEXT,
            renewal_number INTEGER,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(app_user_id);

        -- Experiment enrollments
        CREATE TABLE IF NOT EXISTS experiments (
            id TEXT PRIMARY KEY,
            app_user_id TEXT NOT NULL,
            experiment_id TEXT NOT NULL,
            variant TEXT NOT NULL,
            offering_id TEXT,
            enrolled_at_ms INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(app_user_id, experiment_id)
        );
        CREATE INDEX IF NOT EXISTS idx_experiments_user ON experiments(app_user_id);
        CREATE INDEX IF NOT EXISTS idx_experiments_experiment ON experiments(experiment_id);

        -- Transfers (append-only audit)
        CREATE TABLE IF NOT EXISTS transfers (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL UNIQUE,
            transferred_from TEXT NOT NULL,       -- JSON array
            transferred_to TEXT NOT NULL,         -- JSON array
            entitlement_ids TEXT,                 -- JSON array, NULL = all
            timestamp INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transfers_timestamp ON transfers(timestamp);

        -- Invoices (informational, first write wins)
        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            invoice_id TEXT NOT NULL UNIQUE,
            app_user_id TEXT NOT NULL,
            product_id TEXT,
            store TEXT,
            environment TEXT,
            price_usd REAL,
            currency TEXT,
            price_in_purchased_currency REAL,
            issued_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invoices_user ON invoices(app_user_id);

        -- Virtual currency balances (integer accumulator)
        CREATE TABLE IF NOT EXISTS virtual_currency_balances (
            id TEXT PRIMARY KEY,
            app_user_id TEXT NOT NULL,
            currency_code TEXT NOT NULL,
            currency_name TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            UNIQUE(app_user_id, currency_code)
        );
        CREATE INDEX IF NOT EXISTS idx_vc_balances_user ON virtual_currency_balances(app_user_id);

        -- Virtual currency ledger (append-only)
        -- UNIQUE(transaction_id, adjustment_index) keeps a replayed adjustment from double-counting
        CREATE TABLE IF NOT EXISTS virtual_currency_transactions (
            id TEXT PRIMARY KEY,
            transaction_id TEXT NOT NULL,
            adjustment_index INTEGER NOT NULL,
            app_user_id TEXT NOT NULL,
            currency_code TEXT NOT NULL,
            amount INTEGER NOT NULL,
            source TEXT,
            product_id TEXT,
            environment TEXT,
            timestamp INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(transaction_id, adjustment_index)
        );
        CREATE INDEX IF NOT EXISTS idx_vc_transactions_user ON virtual_currency_transactions(app_user_id, timestamp);

        -- Webhook events (idempotency key + audit log, purged after retention)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL UNIQUE,
            event_type TEXT NOT NULL,
            app_id TEXT,
            app_user_id TEXT,
            environment TEXT NOT NULL,
            store TEXT,
            payload TEXT NOT NULL,
            processed_at INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('processed', 'failed', 'ignored')),
            error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_type ON webhook_events(event_type, processed_at);
        CREATE INDEX IF NOT EXISTS idx_webhook_events_user ON webhook_events(app_user_id, processed_at);
        CREATE INDEX IF NOT EXISTS idx_webhook_events_status ON webhook_events(status, processed_at);
        CREATE INDEX IF NOT EXISTS idx_webhook_events_processed ON webhook_events(processed_at);

        -- Rate limit counters (one row per admitted request)
        CREATE TABLE IF NOT EXISTS rate_limits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rate_limits_key_time ON rate_limits(key, timestamp);
        CREATE INDEX IF NOT EXISTS idx_rate_limits_time ON rate_limits(timestamp);
        "#,
    )?;
    Ok(())
}
