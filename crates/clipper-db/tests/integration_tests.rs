//! Database integration tests. They start PostgreSQL in Docker and are
//! ignored by default: `cargo test -p clipper-db -- --ignored`.

mod integration;
