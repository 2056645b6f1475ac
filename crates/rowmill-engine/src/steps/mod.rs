//! Built-in step implementations.
//!
//! The engine ships a small set of real steps; everything connector-shaped
//! lives outside the core and plugs in through the same [`crate::step::Step`]
//! contract and registry.

pub mod dummy;
pub mod filter_rows;
pub mod row_generator;
pub mod select_values;

pub use dummy::Dummy;
pub use filter_rows::FilterRows;
pub use row_generator::RowGenerator;
pub use select_values::SelectValues;
