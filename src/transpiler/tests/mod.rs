//! Translator test modules.
//!
//! Tests are organized by stage:
//! - `dialects`: function, literal and operator rewrite rules
//! - `paging`: LIMIT/OFFSET emulation
//! - `ddl`: CREATE TABLE translation and trigger synthesis
//! - `national`: unicode column projections

mod dialects;
mod national;
mod paging;
