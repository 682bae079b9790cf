pub mod admin;
pub mod check_in;
pub mod config;
pub mod participant;
pub mod promotion;
pub mod registration;
/// Database schema
pub mod schema;
pub mod transaction;
pub mod user;

use diesel::connection::{
    AnsiTransactionManager, ConnectionSealed, DefaultLoadingMode,
    Instrumentation, LoadConnection, SimpleConnection, TransactionManager,
};
use diesel::expression::QueryMetadata;
use diesel::migration::{MigrationConnection, CREATE_MIGRATIONS_TABLE};
use diesel::query_builder::{Query, QueryFragment, QueryId};
use diesel::r2d2::{ConnectionManager, ManageConnection};
use diesel::sqlite::Sqlite;
use diesel::{
    sql_query, Connection, ConnectionResult, QueryResult, RunQueryDsl,
};
use diesel_tracing::sqlite::InstrumentedSqliteConnection;
use rocket::{Build, Rocket};
use rocket_sync_db_pools::{database, Config, PoolResult, Poolable};

#[database("database")]
pub struct DbConn(TracedSqlite);

/// A SQLite connection whose queries are emitted as `tracing` events (via
/// `diesel-tracing`), wrapped so that it can be pooled by
/// `rocket_sync_db_pools`.
pub struct TracedSqlite(InstrumentedSqliteConnection);

impl SimpleConnection for TracedSqlite {
    fn batch_execute(&mut self, query: &str) -> QueryResult<()> {
        self.0.batch_execute(query)
    }
}

impl ConnectionSealed for TracedSqlite {}

impl Connection for TracedSqlite {
    type Backend = Sqlite;
    type TransactionManager = AnsiTransactionManager;

    fn establish(database_url: &str) -> ConnectionResult<TracedSqlite> {
        Ok(TracedSqlite(InstrumentedSqliteConnection::establish(
            database_url,
        )?))
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        Self::TransactionManager::transaction(self, f)
    }

    fn execute_returning_count<T>(&mut self, source: &T) -> QueryResult<usize>
    where
        T: QueryFragment<Sqlite> + QueryId,
    {
        self.0.execute_returning_count(source)
    }

    fn transaction_state(&mut self) -> &mut Self::TransactionManager {
        self.0.transaction_state()
    }

    fn instrumentation(&mut self) -> &mut dyn Instrumentation {
        self.0.instrumentation()
    }

    fn set_instrumentation(&mut self, instrumentation: impl Instrumentation) {
        self.0.set_instrumentation(instrumentation)
    }
}

impl LoadConnection<DefaultLoadingMode> for TracedSqlite {
    type Cursor<'conn, 'query>
        = <InstrumentedSqliteConnection as LoadConnection<
        DefaultLoadingMode,
    >>::Cursor<'conn, 'query>
    where
        Self: 'conn;
    type Row<'conn, 'query>
        = <InstrumentedSqliteConnection as LoadConnection<
        DefaultLoadingMode,
    >>::Row<'conn, 'query>
    where
        Self: 'conn;

    fn load<'conn, 'query, T>(
        &'conn mut self,
        source: T,
    ) -> QueryResult<Self::Cursor<'conn, 'query>>
    where
        T: Query + QueryFragment<Self::Backend> + QueryId + 'query,
        Self::Backend: QueryMetadata<T::SqlType>,
    {
        self.0.load(source)
    }
}

impl MigrationConnection for TracedSqlite {
    fn setup(&mut self) -> QueryResult<usize> {
        sql_query(CREATE_MIGRATIONS_TABLE).execute(self)
    }
}

pub struct TracedSqliteManager {
    manager: ConnectionManager<InstrumentedSqliteConnection>,
}

impl ManageConnection for TracedSqliteManager {
    type Connection = TracedSqlite;

    type Error = diesel::r2d2::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.manager.connect().map(TracedSqlite)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        self.manager.is_valid(&mut conn.0)
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.manager.has_broken(&mut conn.0)
    }
}

impl Poolable for TracedSqlite {
    type Manager = TracedSqliteManager;

    type Error = std::convert::Infallible;

    fn pool(db_name: &str, rocket: &Rocket<Build>) -> PoolResult<Self> {
        use diesel::r2d2::{CustomizeConnection, Error, Pool};

        #[derive(Debug)]
        struct Customizer;

        impl CustomizeConnection<TracedSqlite, Error> for Customizer {
            fn on_acquire(&self, conn: &mut TracedSqlite) -> Result<(), Error> {
                conn.0
                    .batch_execute(
                        "\
                    PRAGMA journal_mode = WAL;\
                    PRAGMA busy_timeout = 1000;\
                    PRAGMA foreign_keys = ON;\
                ",
                    )
                    .map_err(Error::QueryError)?;

                Ok(())
            }
        }

        let config = Config::from(db_name, rocket)?;
        let manager = TracedSqliteManager {
            manager: ConnectionManager::new(&config.url),
        };
        let pool = Pool::builder()
            .connection_customizer(Box::new(Customizer))
            .max_size(config.pool_size)
            .connection_timeout(std::time::Duration::from_secs(
                config.timeout as u64,
            ))
            .build(manager)?;

        Ok(pool)
    }
}
