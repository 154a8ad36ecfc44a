//! Run log migrations - SQL files embedded with include_str!
//!
//! Each entry is (file name, SQL). They are applied in order and recorded
//! in `sys_migrations`; add new files at the end.

pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
