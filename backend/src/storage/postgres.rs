//! PostgreSQL backend
//!
//! All logs share one `ledger_movements` table keyed by `log_name`. Each
//! write deletes and inserts only the rows its deltas name, inside a single
//! transaction. Batches are upserted one row at a time.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{BatchStatus, IngredientRequirement, LedgerLog, Movement, ProductionBatch, TransactionGroupId};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::{LedgerBackend, LogDelta, LogSnapshot};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgBackend {
    db: PgPool,
}

/// Database row for a movement
#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    log_name: String,
    sequence: i64,
    item_id: Option<Uuid>,
    item_name: String,
    role: String,
    kind: String,
    quantity: Decimal,
    unit: String,
    movement_date: NaiveDate,
    transaction_group_id: Option<Uuid>,
    batch_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Movement {
            id: row.id,
            log: row.log_name.parse().map_err(corrupt)?,
            sequence: row.sequence,
            item_id: row.item_id,
            item_name: row.item_name,
            role: row.role.parse().map_err(corrupt)?,
            kind: row.kind.parse().map_err(corrupt)?,
            quantity: row.quantity,
            unit: row.unit,
            date: row.movement_date,
            transaction_group_id: row.transaction_group_id.map(TransactionGroupId),
            batch_id: row.batch_id,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

/// Database row for a production batch
#[derive(Debug, FromRow)]
struct BatchRow {
    id: String,
    formulation_id: Uuid,
    formulation_name: String,
    output_item: String,
    target_quantity: Decimal,
    status: String,
    requirements: Json<Vec<IngredientRequirement>>,
    actual_yield: Option<String>,
    planned_on: NaiveDate,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for ProductionBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(ProductionBatch {
            id: row.id,
            formulation_id: row.formulation_id,
            formulation_name: row.formulation_name,
            output_item: row.output_item,
            target_quantity: row.target_quantity,
            status: row.status.parse::<BatchStatus>().map_err(corrupt)?,
            requirements: row.requirements.0,
            actual_yield: row.actual_yield,
            planned_on: row.planned_on,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

fn corrupt(msg: &'static str) -> AppError {
    AppError::Storage(format!("Corrupt ledger row: {}", msg))
}

impl PgBackend {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl LedgerBackend for PgBackend {
    async fn load_logs(&self) -> AppResult<Vec<LogSnapshot>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, log_name, sequence, item_id, item_name, role, kind, quantity, unit,
                   movement_date, transaction_group_id, batch_id, notes, created_at
            FROM ledger_movements
            ORDER BY log_name, sequence
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let sequences = sqlx::query_as::<_, (String, i64)>(
            "SELECT log_name, next_sequence FROM ledger_sequences",
        )
        .fetch_all(&self.db)
        .await?;

        let mut logs: BTreeMap<LedgerLog, LogSnapshot> = BTreeMap::new();
        for (name, next_sequence) in sequences {
            let log: LedgerLog = name.parse().map_err(corrupt)?;
            logs.insert(
                log,
                LogSnapshot {
                    log,
                    next_sequence,
                    movements: Vec::new(),
                },
            );
        }

        for row in rows {
            let movement = Movement::try_from(row)?;
            let snapshot = logs
                .entry(movement.log)
                .or_insert_with(|| LogSnapshot::empty(movement.log));
            snapshot.next_sequence = snapshot.next_sequence.max(movement.sequence + 1);
            snapshot.movements.push(movement);
        }

        Ok(logs.into_values().collect())
    }

    async fn apply_logs(&self, deltas: &[LogDelta]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for delta in deltas {
            if !delta.removed.is_empty() {
                sqlx::query("DELETE FROM ledger_movements WHERE log_name = $1 AND id = ANY($2)")
                    .bind(delta.log.as_str())
                    .bind(&delta.removed)
                    .execute(&mut *tx)
                    .await?;
            }

            for m in &delta.inserted {
                sqlx::query(
                    r#"
                    INSERT INTO ledger_movements (
                        id, log_name, sequence, item_id, item_name, role, kind, quantity, unit,
                        movement_date, transaction_group_id, batch_id, notes, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    "#,
                )
                .bind(m.id)
                .bind(m.log.as_str())
                .bind(m.sequence)
                .bind(m.item_id)
                .bind(&m.item_name)
                .bind(m.role.as_str())
                .bind(m.kind.as_str())
                .bind(m.quantity)
                .bind(&m.unit)
                .bind(m.date)
                .bind(m.transaction_group_id.map(|g| g.0))
                .bind(&m.batch_id)
                .bind(&m.notes)
                .bind(m.created_at)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                r#"
                INSERT INTO ledger_sequences (log_name, next_sequence)
                VALUES ($1, $2)
                ON CONFLICT (log_name) DO UPDATE
                SET next_sequence = GREATEST(ledger_sequences.next_sequence, EXCLUDED.next_sequence)
                "#,
            )
            .bind(delta.log.as_str())
            .bind(delta.next_sequence)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_batches(&self) -> AppResult<Vec<ProductionBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, formulation_id, formulation_name, output_item, target_quantity, status,
                   requirements, actual_yield, planned_on, created_at, completed_at
            FROM production_batches
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionBatch::try_from).collect()
    }

    async fn save_batch(&self, b: &ProductionBatch) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO production_batches (
                id, formulation_id, formulation_name, output_item, target_quantity, status,
                requirements, actual_yield, planned_on, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                actual_yield = EXCLUDED.actual_yield,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(&b.id)
        .bind(b.formulation_id)
        .bind(&b.formulation_name)
        .bind(&b.output_item)
        .bind(b.target_quantity)
        .bind(b.status.as_str())
        .bind(Json(&b.requirements))
        .bind(&b.actual_yield)
        .bind(b.planned_on)
        .bind(b.created_at)
        .bind(b.completed_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
