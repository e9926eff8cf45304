use crate::client::{ClientResult, GenericClient};
use crate::events::EventSource;
use crate::statement::ExecutedStatement;
use std::sync::Arc;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A database client that publishes every statement before executing it.
///
/// Hand [`events`](Self::events) to a [`QueryCounter`](crate::QueryCounter)
/// to count what runs through this client.
pub struct InstrumentedClient<C> {
    client: C,
    events: Arc<EventSource>,
}

impl<C: GenericClient> InstrumentedClient<C> {
    /// Wrap a client with a fresh event source.
    pub fn new(client: C) -> Self {
        Self {
            client,
            events: Arc::new(EventSource::new()),
        }
    }

    /// Publish to a shared event source (e.g. one per test, many clients).
    pub fn with_events(mut self, events: Arc<EventSource>) -> Self {
        self.events = events;
        self
    }

    /// The event source statements are published to.
    pub fn events(&self) -> Arc<EventSource> {
        Arc::clone(&self.events)
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.client
    }

    /// Get the inner client, consuming this wrapper.
    pub fn into_inner(self) -> C {
        self.client
    }

    fn publish(&self, sql: &str, tag: Option<&str>) {
        let statement = ExecutedStatement {
            canonical_sql: sql.to_string(),
            tag: tag.map(str::to_string),
        };
        self.events.dispatch(&statement);
    }
}

impl<C: GenericClient> GenericClient for InstrumentedClient<C> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ClientResult<Vec<Row>> {
        self.publish(sql, None);
        self.client.query(sql, params).await
    }

    async fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ClientResult<Vec<Row>> {
        self.publish(sql, Some(tag));
        self.client.query_tagged(tag, sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ClientResult<Row> {
        self.publish(sql, None);
        self.client.query_one(sql, params).await
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ClientResult<Option<Row>> {
        self.publish(sql, None);
        self.client.query_opt(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ClientResult<u64> {
        self.publish(sql, None);
        self.client.execute(sql, params).await
    }

    async fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ClientResult<u64> {
        self.publish(sql, Some(tag));
        self.client.execute_tagged(tag, sql, params).await
    }
}
