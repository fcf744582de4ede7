use std::fmt;
use std::str::FromStr;

/// SQL engines the relational backend can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

/// Every statement the relational backend issues, spelled for one engine.
///
/// Engines only differ in placeholder syntax, auto-increment columns and how
/// the retention cutoff is cast to a timestamp, so adding an engine means
/// adding one of these tables.
#[derive(Debug)]
pub struct Queries {
    pub create_link_table: &'static str,
    pub create_view_table: &'static str,
    /// Run on every new pooled connection.
    pub connect_statements: &'static [&'static str],
    /// Opens the create transaction.
    pub begin_transaction: &'static str,
    pub select_link_id: &'static str,
    pub insert_link: &'static str,
    pub select_link: &'static str,
    pub insert_view: &'static str,
    pub delete_links_before: &'static str,
    /// `chrono` format for the cutoff bound into `delete_links_before`.
    pub cutoff_format: &'static str,
}

static MYSQL: Queries = Queries {
    create_link_table: r#"
        CREATE TABLE IF NOT EXISTS link (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            short_name VARCHAR(64) UNIQUE,
            page_state MEDIUMTEXT
        )
    "#,
    create_view_table: r#"
        CREATE TABLE IF NOT EXISTS view (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            link_id BIGINT,
            viewed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (link_id) REFERENCES link(id) ON DELETE CASCADE
        )
    "#,
    connect_statements: &[],
    begin_transaction: "BEGIN",
    select_link_id: "SELECT id FROM link WHERE short_name = ?",
    insert_link: "INSERT INTO link (short_name, page_state) VALUES (?, ?)",
    select_link: "SELECT id, page_state FROM link WHERE short_name = ?",
    insert_view: "INSERT INTO view (link_id) VALUES (?)",
    delete_links_before: "DELETE FROM link WHERE created_at < TIMESTAMP(?)",
    cutoff_format: "%Y-%m-%d %H:%M:%S",
};

static POSTGRES: Queries = Queries {
    create_link_table: r#"
        CREATE TABLE IF NOT EXISTS link (
            id BIGSERIAL PRIMARY KEY,
            created_at TIMESTAMPTZ DEFAULT now(),
            short_name VARCHAR(64) UNIQUE,
            page_state TEXT
        )
    "#,
    create_view_table: r#"
        CREATE TABLE IF NOT EXISTS view (
            id BIGSERIAL PRIMARY KEY,
            link_id BIGINT,
            viewed_at TIMESTAMPTZ DEFAULT now(),
            FOREIGN KEY (link_id) REFERENCES link(id) ON DELETE CASCADE
        )
    "#,
    connect_statements: &[],
    begin_transaction: "BEGIN",
    select_link_id: "SELECT id FROM link WHERE short_name = $1",
    insert_link: "INSERT INTO link (short_name, page_state) VALUES ($1, $2)",
    select_link: "SELECT id, page_state FROM link WHERE short_name = $1",
    insert_view: "INSERT INTO view (link_id) VALUES ($1)",
    delete_links_before: "DELETE FROM link WHERE created_at < $1::timestamptz",
    cutoff_format: "%Y-%m-%d %H:%M:%S%:z",
};

static SQLITE: Queries = Queries {
    create_link_table: r#"
        CREATE TABLE IF NOT EXISTS link (
            id INTEGER NOT NULL PRIMARY KEY,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            short_name TEXT UNIQUE,
            page_state TEXT
        )
    "#,
    create_view_table: r#"
        CREATE TABLE IF NOT EXISTS view (
            id INTEGER NOT NULL PRIMARY KEY,
            link_id INTEGER,
            viewed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (link_id) REFERENCES link(id) ON DELETE CASCADE
        )
    "#,
    // Foreign keys (and with them the view cascade) are per connection in SQLite.
    connect_statements: &["PRAGMA foreign_keys = ON"],
    // Upgrading a deferred transaction's read lock fails with SQLITE_BUSY
    // instead of waiting, so take the write lock at BEGIN.
    begin_transaction: "BEGIN IMMEDIATE",
    select_link_id: "SELECT id FROM link WHERE short_name = ?",
    insert_link: "INSERT INTO link (short_name, page_state) VALUES (?, ?)",
    select_link: "SELECT id, page_state FROM link WHERE short_name = ?",
    insert_view: "INSERT INTO view (link_id) VALUES (?)",
    delete_links_before: "DELETE FROM link WHERE created_at < DATETIME(?)",
    cutoff_format: "%Y-%m-%d %H:%M:%S",
};

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

    pub fn queries(self) -> &'static Queries {
        match self {
            Dialect::MySql => &MYSQL,
            Dialect::Postgres => &POSTGRES,
            Dialect::Sqlite => &SQLITE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Infer the engine from a DSN's URL scheme.
    pub fn from_dsn(dsn: &str) -> Option<Dialect> {
        let scheme = dsn.split_once(':')?.0.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Turn a configured DSN into a URL the `Any` driver can dispatch on.
    ///
    /// SQLite also accepts a bare file path, which is opened read-write and
    /// created if missing. The other engines require a URL.
    pub fn connection_url(self, dsn: &str) -> Result<String, String> {
        match Dialect::from_dsn(dsn) {
            Some(d) if d == self => Ok(dsn.to_string()),
            Some(d) => Err(format!(
                "DSN is for the {d} driver but the {self} driver was selected"
            )),
            None if self == Dialect::Sqlite => Ok(format!("sqlite://{dsn}?mode=rwc")),
            None => Err(format!(
                "the {self} driver needs a URL DSN starting with {self}://"
            )),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgres" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!(
                "unsupported SQL driver {other:?}, supported values are 'mysql', 'postgres' and 'sqlite'"
            )),
        }
    }
}
