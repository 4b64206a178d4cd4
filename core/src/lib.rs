//! MySQL to PostgreSQL statement rewriting.
//!
//! Parse a batch of MySQL statements, rewrite each one into PostgreSQL form,
//! and render the results back to text. Statements without a safe automatic
//! mapping come back as annotated comments instead of aborting the batch.
//!
//! ```ignore
//! use sqlbridge_core::batch::convert_batch;
//! let out = convert_batch("SELECT IFNULL(comment, 'No Comment') FROM grades;");
//! assert!(out.sql.contains("COALESCE"));
//! ```

pub mod batch;
pub mod error;
pub mod naming;
pub mod rewriter;
pub mod split;

pub mod prelude {
    pub use crate::batch::{Conversion, ConversionReport, StatementStatus, convert_batch};
    pub use crate::error::{RewriteError, RewriteResult};
    pub use crate::rewriter::{RewriteOutput, Rewriter};
}
