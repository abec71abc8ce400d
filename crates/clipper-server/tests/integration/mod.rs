mod api_tests;
pub mod common;
mod db_tests;
