use sqlx::PgPool;

/// Receiver of every SQL [`Processor`](kanau::processor::Processor) in
/// [`crate::entities`]. One per store, wrapping the shared pool.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
