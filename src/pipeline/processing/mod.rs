// Pipeline processing: column normalization, numeric coercion, identifier reconciliation

pub mod coerce;
pub mod normalize;
pub mod reconcile;

pub use coerce::{CoercionOutcome, RowCoercer, RowRejected, ValidatedRow};
pub use normalize::{CanonicalKey, ColumnMapping, ColumnNormalizer, NormalizedRow};
pub use reconcile::{IdentifierPool, IdentityReconciler, ReconciledBatch};
