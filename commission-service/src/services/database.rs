//! Database service for commission-service.

use crate::models::{
    Commission, CommissionRule, CommissionStatus, CreateCommission, CreateCommissionRule,
    CreateInvoice, Invoice, InvoiceItem, InvoiceStatus, InvoiceWithItems, ListCommissionsFilter,
    ListInvoicesFilter, NewInvoiceItem, Partner, PartnerDashboard, Project, RuleStatus,
    StatusCount, StatusTotal, UpdateCommission, UpdateCommissionRule, UpdateInvoice,
};
use crate::services::metrics::{
    COMMISSIONS_TOTAL, DB_QUERY_DURATION, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL,
    NUMBERING_RETRIES_TOTAL,
};
use crate::services::{calculator, numbering};
use agency_core::error::AppError;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Bounded internal retries for invoice number allocation conflicts.
const NUMBERING_RETRIES: u32 = 3;

/// A line item with its commission reference resolved and amount computed.
struct ResolvedLine {
    commission_id: Option<Uuid>,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    amount: Decimal,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "commission-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Partner / Project Directory
    // -------------------------------------------------------------------------

    /// Create a partner row. Partner management proper lives outside this
    /// service; this exists for seeding and imports.
    #[instrument(skip(self))]
    pub async fn create_partner(&self, name: &str) -> Result<Partner, AppError> {
        let partner = sqlx::query_as::<_, Partner>(
            r#"
            INSERT INTO partners (partner_id, name, status)
            VALUES ($1, $2, 'active')
            RETURNING partner_id, name, status, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create partner: {}", e)))?;

        Ok(partner)
    }

    /// Get a partner by ID.
    #[instrument(skip(self), fields(partner_id = %partner_id))]
    pub async fn get_partner(&self, partner_id: Uuid) -> Result<Option<Partner>, AppError> {
        let partner = sqlx::query_as::<_, Partner>(
            r#"
            SELECT partner_id, name, status, created_utc, updated_utc
            FROM partners
            WHERE partner_id = $1
            "#,
        )
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get partner: {}", e)))?;

        Ok(partner)
    }

    /// Create a project row under a partner.
    #[instrument(skip(self), fields(partner_id = %partner_id))]
    pub async fn create_project(
        &self,
        partner_id: Uuid,
        name: &str,
        status: &str,
    ) -> Result<Project, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (project_id, partner_id, name, status)
            VALUES ($1, $2, $3, $4)
            RETURNING project_id, partner_id, name, status, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(partner_id)
        .bind(name)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create project: {}", e)))?;

        Ok(project)
    }

    /// Get a project by ID.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT project_id, partner_id, name, status, created_utc, updated_utc
            FROM projects
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        Ok(project)
    }

    // -------------------------------------------------------------------------
    // Commission Rule Operations
    // -------------------------------------------------------------------------

    /// Create a commission rule. Amount limbs are expected to be normalized
    /// (exactly one active) by the caller.
    #[instrument(skip(self, input), fields(project_id = %input.project_id))]
    pub async fn create_rule(
        &self,
        input: &CreateCommissionRule,
    ) -> Result<CommissionRule, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_rule"])
            .start_timer();

        let rule = sqlx::query_as::<_, CommissionRule>(
            r#"
            INSERT INTO commission_rules (rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, 'unapproved', $7)
            RETURNING rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.project_id)
        .bind(&input.name)
        .bind(input.commission_type.as_str())
        .bind(input.rate_percent)
        .bind(input.fixed_amount)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create rule: {}", e)))?;

        timer.observe_duration();

        info!(rule_id = %rule.rule_id, name = %rule.name, "Commission rule created");

        Ok(rule)
    }

    /// Get a commission rule by ID.
    #[instrument(skip(self), fields(rule_id = %rule_id))]
    pub async fn get_rule(&self, rule_id: Uuid) -> Result<Option<CommissionRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_rule"])
            .start_timer();

        let rule = sqlx::query_as::<_, CommissionRule>(
            r#"
            SELECT rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes, created_utc, updated_utc
            FROM commission_rules
            WHERE rule_id = $1
            "#,
        )
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get rule: {}", e)))?;

        timer.observe_duration();

        Ok(rule)
    }

    /// List commission rules, optionally scoped to a project.
    #[instrument(skip(self))]
    pub async fn list_rules(
        &self,
        project_id: Option<Uuid>,
    ) -> Result<Vec<CommissionRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rules"])
            .start_timer();

        let rules = sqlx::query_as::<_, CommissionRule>(
            r#"
            SELECT rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes, created_utc, updated_utc
            FROM commission_rules
            WHERE ($1::uuid IS NULL OR project_id = $1)
            ORDER BY created_utc DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list rules: {}", e)))?;

        timer.observe_duration();

        Ok(rules)
    }

    /// List only the rules usable for invoicing on a project: the dedicated
    /// confirmed-only read path.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_usable_rules(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<CommissionRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_usable_rules"])
            .start_timer();

        let rules = sqlx::query_as::<_, CommissionRule>(
            r#"
            SELECT rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes, created_utc, updated_utc
            FROM commission_rules
            WHERE project_id = $1 AND status = $2
            ORDER BY created_utc DESC
            "#,
        )
        .bind(project_id)
        .bind(RuleStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list usable rules: {}", e))
        })?;

        timer.observe_duration();

        Ok(rules)
    }

    /// Update a commission rule's economic fields as a unit.
    #[instrument(skip(self, input), fields(rule_id = %rule_id))]
    pub async fn update_rule(
        &self,
        rule_id: Uuid,
        input: &UpdateCommissionRule,
    ) -> Result<Option<CommissionRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_rule"])
            .start_timer();

        let rule = sqlx::query_as::<_, CommissionRule>(
            r#"
            UPDATE commission_rules
            SET name = $2,
                commission_type = $3,
                rate_percent = $4,
                fixed_amount = $5,
                notes = COALESCE($6, notes),
                updated_utc = NOW()
            WHERE rule_id = $1
            RETURNING rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(rule_id)
        .bind(&input.name)
        .bind(input.commission_type.as_str())
        .bind(input.rate_percent)
        .bind(input.fixed_amount)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update rule: {}", e)))?;

        timer.observe_duration();

        if let Some(ref r) = rule {
            info!(rule_id = %r.rule_id, "Commission rule updated");
        }

        Ok(rule)
    }

    /// Move a rule through its lifecycle. The transition must be on the
    /// allow-list for the rule's current status.
    #[instrument(skip(self), fields(rule_id = %rule_id))]
    pub async fn update_rule_status(
        &self,
        rule_id: Uuid,
        target: RuleStatus,
    ) -> Result<Option<CommissionRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_rule_status"])
            .start_timer();

        let Some(existing) = self.get_rule(rule_id).await? else {
            return Ok(None);
        };
        let current = RuleStatus::parse(&existing.status).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "rule {} has unrecognized stored status '{}'",
                rule_id,
                existing.status
            ))
        })?;
        if !current.can_transition_to(target) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Cannot move rule from {} to {}",
                current.as_str(),
                target.as_str()
            )));
        }

        let rule = sqlx::query_as::<_, CommissionRule>(
            r#"
            UPDATE commission_rules
            SET status = $2, updated_utc = NOW()
            WHERE rule_id = $1
            RETURNING rule_id, project_id, name, commission_type, rate_percent, fixed_amount, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(rule_id)
        .bind(target.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update rule status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref r) = rule {
            info!(rule_id = %r.rule_id, status = %r.status, "Commission rule status updated");
        }

        Ok(rule)
    }

    /// Delete a commission rule.
    #[instrument(skip(self), fields(rule_id = %rule_id))]
    pub async fn delete_rule(&self, rule_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_rule"])
            .start_timer();

        let result = sqlx::query("DELETE FROM commission_rules WHERE rule_id = $1")
            .bind(rule_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete rule: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Commission Record Operations
    // -------------------------------------------------------------------------

    /// Create a realized commission record. The amount is computed from
    /// base_amount and rate here, at write time.
    #[instrument(skip(self, input), fields(partner_id = %input.partner_id))]
    pub async fn create_commission(
        &self,
        input: &CreateCommission,
    ) -> Result<Commission, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_commission"])
            .start_timer();

        self.get_project(input.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;
        self.get_partner(input.partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Partner not found")))?;

        let amount = calculator::commission_amount(input.base_amount, input.rate);

        let commission = sqlx::query_as::<_, Commission>(
            r#"
            INSERT INTO commissions (commission_id, project_id, partner_id, base_amount, rate, amount, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING commission_id, project_id, partner_id, base_amount, rate, amount, status, payment_date, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.project_id)
        .bind(input.partner_id)
        .bind(input.base_amount)
        .bind(input.rate)
        .bind(amount)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create commission: {}", e))
        })?;

        timer.observe_duration();

        COMMISSIONS_TOTAL
            .with_label_values(&[commission.status.as_str()])
            .inc();
        info!(
            commission_id = %commission.commission_id,
            amount = %commission.amount,
            "Commission record created"
        );

        Ok(commission)
    }

    /// Get a commission record by ID.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn get_commission(
        &self,
        commission_id: Uuid,
    ) -> Result<Option<Commission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_commission"])
            .start_timer();

        let commission = sqlx::query_as::<_, Commission>(
            r#"
            SELECT commission_id, project_id, partner_id, base_amount, rate, amount, status, payment_date, notes, created_utc, updated_utc
            FROM commissions
            WHERE commission_id = $1
            "#,
        )
        .bind(commission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get commission: {}", e)))?;

        timer.observe_duration();

        Ok(commission)
    }

    /// List commission records.
    #[instrument(skip(self, filter))]
    pub async fn list_commissions(
        &self,
        filter: &ListCommissionsFilter,
    ) -> Result<Vec<Commission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_commissions"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let commissions = sqlx::query_as::<_, Commission>(
            r#"
            SELECT commission_id, project_id, partner_id, base_amount, rate, amount, status, payment_date, notes, created_utc, updated_utc
            FROM commissions
            WHERE ($1::uuid IS NULL OR partner_id = $1)
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::varchar IS NULL OR status = $3)
            ORDER BY created_utc DESC
            LIMIT $4
            "#,
        )
        .bind(filter.partner_id)
        .bind(filter.project_id)
        .bind(&status_str)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list commissions: {}", e))
        })?;

        timer.observe_duration();

        Ok(commissions)
    }

    /// Update a commission record. The stored amount is recomputed from the
    /// merged base_amount and rate on every write.
    #[instrument(skip(self, input), fields(commission_id = %commission_id))]
    pub async fn update_commission(
        &self,
        commission_id: Uuid,
        input: &UpdateCommission,
    ) -> Result<Option<Commission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_commission"])
            .start_timer();

        let Some(existing) = self.get_commission(commission_id).await? else {
            return Ok(None);
        };

        let base_amount = input.base_amount.unwrap_or(existing.base_amount);
        let rate = input.rate.unwrap_or(existing.rate);
        let amount = calculator::commission_amount(base_amount, rate);

        let commission = sqlx::query_as::<_, Commission>(
            r#"
            UPDATE commissions
            SET base_amount = $2,
                rate = $3,
                amount = $4,
                payment_date = COALESCE($5, payment_date),
                notes = COALESCE($6, notes),
                updated_utc = NOW()
            WHERE commission_id = $1
            RETURNING commission_id, project_id, partner_id, base_amount, rate, amount, status, payment_date, notes, created_utc, updated_utc
            "#,
        )
        .bind(commission_id)
        .bind(base_amount)
        .bind(rate)
        .bind(amount)
        .bind(input.payment_date)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update commission: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref c) = commission {
            info!(commission_id = %c.commission_id, amount = %c.amount, "Commission record updated");
        }

        Ok(commission)
    }

    /// Move a commission record through its lifecycle.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn update_commission_status(
        &self,
        commission_id: Uuid,
        target: CommissionStatus,
        payment_date: Option<NaiveDate>,
    ) -> Result<Option<Commission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_commission_status"])
            .start_timer();

        let Some(existing) = self.get_commission(commission_id).await? else {
            return Ok(None);
        };
        let current = CommissionStatus::parse(&existing.status).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "commission {} has unrecognized stored status '{}'",
                commission_id,
                existing.status
            ))
        })?;
        if !current.can_transition_to(target) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Cannot move commission from {} to {}",
                current.as_str(),
                target.as_str()
            )));
        }

        let commission = sqlx::query_as::<_, Commission>(
            r#"
            UPDATE commissions
            SET status = $2,
                payment_date = COALESCE($3, payment_date),
                updated_utc = NOW()
            WHERE commission_id = $1
            RETURNING commission_id, project_id, partner_id, base_amount, rate, amount, status, payment_date, notes, created_utc, updated_utc
            "#,
        )
        .bind(commission_id)
        .bind(target.as_str())
        .bind(payment_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update commission status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref c) = commission {
            COMMISSIONS_TOTAL.with_label_values(&[c.status.as_str()]).inc();
            info!(commission_id = %c.commission_id, status = %c.status, "Commission status updated");
        }

        Ok(commission)
    }

    /// Delete a commission record.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn delete_commission(&self, commission_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_commission"])
            .start_timer();

        let result = sqlx::query("DELETE FROM commissions WHERE commission_id = $1")
            .bind(commission_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete commission: {}", e))
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    /// Sum commission amounts for a partner, optionally filtered by status.
    /// A partner with no matching rows sums to zero.
    #[instrument(skip(self), fields(partner_id = %partner_id))]
    pub async fn sum_commission_amount(
        &self,
        partner_id: Uuid,
        status: Option<CommissionStatus>,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_commission_amount"])
            .start_timer();

        let status_str = status.map(|s| s.as_str().to_string());
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM commissions
            WHERE partner_id = $1
              AND ($2::varchar IS NULL OR status = $2)
            "#,
        )
        .bind(partner_id)
        .bind(&status_str)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum commissions: {}", e))
        })?;

        timer.observe_duration();

        Ok(total)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice and its items atomically, allocating the next
    /// yearly invoice number inside the same transaction. Number collisions
    /// are retried a bounded number of times before surfacing.
    #[instrument(skip(self, input), fields(partner_id = %input.partner_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceWithItems, AppError> {
        self.get_partner(input.partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Partner not found")))?;
        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice requires at least one line item"
            )));
        }

        let mut last_err = None;
        for attempt in 1..=NUMBERING_RETRIES {
            match self.try_create_invoice(input).await {
                Err(AppError::NumberingConflict(e)) => {
                    NUMBERING_RETRIES_TOTAL.with_label_values(&["retried"]).inc();
                    warn!(attempt, "Invoice number collision, retrying allocation");
                    last_err = Some(AppError::NumberingConflict(e));
                }
                Ok(created) => {
                    INVOICES_TOTAL
                        .with_label_values(&[created.invoice.status.as_str()])
                        .inc();
                    let amount = created.invoice.total_amount.to_f64().unwrap_or_else(|| {
                        warn!(
                            invoice_id = %created.invoice.invoice_id,
                            total_amount = %created.invoice.total_amount,
                            "Total amount not representable as f64, metric records 0"
                        );
                        0.0
                    });
                    INVOICE_AMOUNT_TOTAL
                        .with_label_values(&[created.invoice.status.as_str()])
                        .inc_by(amount);
                    info!(
                        invoice_id = %created.invoice.invoice_id,
                        invoice_number = %created.invoice.invoice_number,
                        total_amount = %created.invoice.total_amount,
                        "Invoice created"
                    );
                    return Ok(created);
                }
                Err(other) => return Err(other),
            }
        }

        NUMBERING_RETRIES_TOTAL
            .with_label_values(&["exhausted"])
            .inc();
        Err(last_err.unwrap_or_else(|| {
            AppError::NumberingConflict(anyhow::anyhow!("Invoice number retries exhausted"))
        }))
    }

    /// One creation attempt: everything inside a single transaction.
    async fn try_create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Numbers are scoped to the current calendar year, not the issue date.
        let invoice_number =
            numbering::allocate_invoice_number(&mut tx, Utc::now().year()).await?;

        let lines = resolve_items(&mut tx, &input.items).await?;
        let subtotal: Decimal = lines.iter().map(|l| l.amount).sum();
        let tax = calculator::tax_amount(subtotal);
        let total = subtotal + tax;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (invoice_id, partner_id, invoice_number, issue_date, due_date, subtotal, tax_amount, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING invoice_id, partner_id, invoice_number, issue_date, due_date, subtotal, tax_amount, total_amount, status, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.partner_id)
        .bind(&invoice_number)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(subtotal)
        .bind(tax)
        .bind(total)
        .bind(input.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::NumberingConflict(anyhow::anyhow!(
                    "Invoice number {} was allocated concurrently",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        let items = insert_items(&mut tx, invoice.invoice_id, &lines).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        Ok(InvoiceWithItems { invoice, items })
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, partner_id, invoice_number, issue_date, due_date, subtotal, tax_amount, total_amount, status, created_utc, updated_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get the items owned by an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, commission_id, description, quantity, unit_price, amount, sort_order, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e))
        })?;

        Ok(items)
    }

    /// Get an invoice with its items.
    pub async fn get_invoice_with_items(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceWithItems>, AppError> {
        let Some(invoice) = self.get_invoice(invoice_id).await? else {
            return Ok(None);
        };
        let items = self.get_invoice_items(invoice_id).await?;
        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    /// List invoices.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, partner_id, invoice_number, issue_date, due_date, subtotal, tax_amount, total_amount, status, created_utc, updated_utc
            FROM invoices
            WHERE ($1::uuid IS NULL OR partner_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_utc DESC
            LIMIT $3
            "#,
        )
        .bind(filter.partner_id)
        .bind(&status_str)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update an invoice, replacing its entire item list and recomputing
    /// subtotal/tax/total from scratch. Issued and paid invoices are
    /// immutable and reject the update.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<InvoiceWithItems>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let Some(existing) = self.get_invoice(invoice_id).await? else {
            return Ok(None);
        };
        self.reject_if_immutable(&existing)?;
        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice requires at least one line item"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Wholesale replacement, not a diff-merge.
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to clear invoice items: {}", e))
            })?;

        let lines = resolve_items(&mut tx, &input.items).await?;
        let subtotal: Decimal = lines.iter().map(|l| l.amount).sum();
        let tax = calculator::tax_amount(subtotal);
        let total = subtotal + tax;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET issue_date = COALESCE($2, issue_date),
                due_date = COALESCE($3, due_date),
                subtotal = $4,
                tax_amount = $5,
                total_amount = $6,
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING invoice_id, partner_id, invoice_number, issue_date, due_date, subtotal, tax_amount, total_amount, status, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(subtotal)
        .bind(tax)
        .bind(total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        let items = insert_items(&mut tx, invoice_id, &lines).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice update: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, total_amount = %invoice.total_amount, "Invoice updated");

        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    /// Change an invoice's status. No recomputation; the transition must be
    /// on the allow-list for the current status.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        target: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let Some(existing) = self.get_invoice(invoice_id).await? else {
            return Ok(None);
        };
        let current = self.parse_invoice_status(&existing)?;
        if !current.can_transition_to(target) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Cannot move invoice {} from {} to {}",
                existing.invoice_number,
                current.as_str(),
                target.as_str()
            )));
        }

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $2, updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING invoice_id, partner_id, invoice_number, issue_date, due_date, subtotal, tax_amount, total_amount, status, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .bind(target.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            INVOICES_TOTAL.with_label_values(&[inv.status.as_str()]).inc();
            info!(
                invoice_id = %inv.invoice_id,
                invoice_number = %inv.invoice_number,
                status = %inv.status,
                "Invoice status updated"
            );
        }

        Ok(invoice)
    }

    /// Delete an invoice and, through the cascade, its items. Issued and
    /// paid invoices reject deletion.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let Some(existing) = self.get_invoice(invoice_id).await? else {
            return Ok(false);
        };
        self.reject_if_immutable(&existing)?;

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    fn parse_invoice_status(&self, invoice: &Invoice) -> Result<InvoiceStatus, AppError> {
        InvoiceStatus::parse(&invoice.status).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "invoice {} has unrecognized stored status '{}'",
                invoice.invoice_id,
                invoice.status
            ))
        })
    }

    fn reject_if_immutable(&self, invoice: &Invoice) -> Result<(), AppError> {
        if self.parse_invoice_status(invoice)?.is_immutable() {
            return Err(AppError::ImmutableInvoice(anyhow::anyhow!(
                "Invoice {} is {} and can no longer be modified",
                invoice.invoice_number,
                invoice.status
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Dashboard Aggregates
    // -------------------------------------------------------------------------

    /// Read-only rollups for a partner. Every aggregate treats an empty
    /// result set as zero.
    #[instrument(skip(self), fields(partner_id = %partner_id))]
    pub async fn partner_dashboard(&self, partner_id: Uuid) -> Result<PartnerDashboard, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["partner_dashboard"])
            .start_timer();

        let projects: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM projects
            WHERE partner_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count projects: {}", e)))?;

        let commissions: Vec<(String, i64, Decimal)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(amount), 0)
            FROM commissions
            WHERE partner_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate commissions: {}", e))
        })?;

        let commission_total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM commissions WHERE partner_id = $1",
        )
        .bind(partner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to total commissions: {}", e))
        })?;

        let rules: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT cr.status, COUNT(*)
            FROM commission_rules cr
            JOIN projects p ON p.project_id = cr.project_id
            WHERE p.partner_id = $1
            GROUP BY cr.status
            ORDER BY cr.status
            "#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count rules: {}", e)))?;

        let invoices: Vec<(String, i64, Decimal)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(total_amount), 0)
            FROM invoices
            WHERE partner_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate invoices: {}", e))
        })?;

        let invoice_total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0) FROM invoices WHERE partner_id = $1",
        )
        .bind(partner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to total invoices: {}", e)))?;

        timer.observe_duration();

        Ok(PartnerDashboard {
            partner_id,
            projects_by_status: projects
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            commission_total,
            commissions_by_status: commissions
                .into_iter()
                .map(|(status, count, total_amount)| StatusTotal {
                    status,
                    count,
                    total_amount,
                })
                .collect(),
            rules_by_status: rules
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            invoice_total,
            invoices_by_status: invoices
                .into_iter()
                .map(|(status, count, total_amount)| StatusTotal {
                    status,
                    count,
                    total_amount,
                })
                .collect(),
        })
    }
}

/// Resolve commission references and derive each item amount. A reference to
/// a commission that does not exist is dropped; the item survives as free
/// text.
async fn resolve_items(
    tx: &mut Transaction<'_, Postgres>,
    items: &[NewInvoiceItem],
) -> Result<Vec<ResolvedLine>, AppError> {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let commission_id = match item.commission_id {
            Some(id) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM commissions WHERE commission_id = $1)",
                )
                .bind(id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to resolve commission reference: {}",
                        e
                    ))
                })?;
                if exists { Some(id) } else { None }
            }
            None => None,
        };

        lines.push(ResolvedLine {
            commission_id,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount: Decimal::from(item.quantity) * item.unit_price,
        });
    }
    Ok(lines)
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    lines: &[ResolvedLine],
) -> Result<Vec<InvoiceItem>, AppError> {
    let mut items = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (item_id, invoice_id, commission_id, description, quantity, unit_price, amount, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING item_id, invoice_id, commission_id, description, quantity, unit_price, amount, sort_order, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(line.commission_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.amount)
        .bind(idx as i32)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice item: {}", e))
        })?;
        items.push(item);
    }
    Ok(items)
}
