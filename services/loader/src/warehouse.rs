//! Warehouse collaborator: appends batches to pre-provisioned tables.

use anyhow::{Context, Result};
use pipeline::{Field, NormalizedRow, TableName};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::config::WarehouseConfig;

/// Rows per INSERT statement. 12 binds each keeps us far below the 65535 parameter cap.
const ROWS_PER_STATEMENT: usize = 1000;

const APPLICATION_NAME: &str = "hospital-loader";

/// Bulk-append contract the loading loop depends on.
pub trait Loader {
    /// Append rows to an existing table, returning how many were written.
    async fn append(&self, table: &TableName, rows: &[NormalizedRow]) -> Result<u64>;
}

/// Quote an identifier for the warehouse, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list() -> String {
    Field::ALL
        .iter()
        .map(|f| quote_ident(f.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A connection pool scoped to one run. Call [`Warehouse::close`] when loading is done.
pub struct Warehouse {
    pool: PgPool,
    schema: String,
}

impl Warehouse {
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .application_name(config.warehouse.as_deref().unwrap_or(APPLICATION_NAME));

        let role = config.role.clone();
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .after_connect(move |conn, _meta| {
                let role = role.clone();
                Box::pin(async move {
                    if let Some(role) = role {
                        let statement = format!("SET ROLE {}", quote_ident(&role));
                        sqlx::query(&statement).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to warehouse at {}:{}",
                    config.host, config.port
                )
            })?;

        info!(host = %config.host, database = %config.database, schema = %config.schema, "connected to warehouse");
        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    fn target(&self, table: &TableName) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table.as_str()))
    }

    pub async fn close(self) {
        self.pool.close().await;
        debug!("warehouse connection closed");
    }
}

impl Loader for Warehouse {
    async fn append(&self, table: &TableName, rows: &[NormalizedRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let target = self.target(table);
        let columns = column_list();

        // One transaction per batch: a table either gets the whole batch or nothing
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;
        let mut inserted = 0u64;
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", target, columns));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.record_type.clone())
                    .push_bind(row.customer_name.clone())
                    .push_bind(row.customer_id.clone())
                    .push_bind(row.customer_open_date)
                    .push_bind(row.last_consulted_date)
                    .push_bind(row.vaccination_type.clone())
                    .push_bind(row.doctor.clone())
                    .push_bind(row.state.clone())
                    .push_bind(row.country.clone())
                    .push_bind(row.post_code.clone())
                    .push_bind(row.date_of_birth)
                    .push_bind(row.active_customer.clone());
            });
            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert into {}", target))?;
            inserted += result.rows_affected();
        }
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit rows for {}", target))?;

        Ok(inserted)
    }
}
