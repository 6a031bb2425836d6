//! Symbol-type graph engine
//!
//! The core of an ABI monitoring toolkit: a language-neutral graph model of
//! an ABI surface, the passes that normalise it, and a structural differ.
//!
//! Front-ends build a [`graph::Graph`] through `allocate`/`set`/`add` and
//! hand the single [`graph::Interface`] root to the pipeline:
//!
//! ```rust,ignore
//! let root = resolution::resolve_types(&mut graph, root, &mut metrics)?;
//! let hashes = fingerprint::fingerprint(&graph, root, &mut metrics);
//! let root = deduplication::deduplicate(&mut graph, root, &hashes, &mut metrics);
//! ```
//!
//! Two normalised roots (possibly in one shared graph) are then compared
//! with [`comparison::diff`], and the resulting diff graph rendered with
//! [`reporting::report`].

pub mod comparison;
pub mod deduplication;
pub mod equality;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod hashing;
pub mod metrics;
pub mod naming;
pub mod order;
pub mod reporting;
pub mod resolution;
pub mod scc;
pub mod serial;
pub mod substitution;
pub mod unification;

pub use comparison::{Comparison, Diff, DiffDetail, DiffOutcome, Ignore, IgnoreKind, diff};
pub use deduplication::deduplicate;
pub use error::Error;
pub use fingerprint::fingerprint;
pub use graph::{Graph, Id, Node};
pub use metrics::Metrics;
pub use reporting::{OutputFormat, report};
pub use resolution::resolve_types;
