mod support;
mod steps;

mod auto_apply;
mod cancellation;
mod dedup;
mod defer_stream;
mod error_locality;
mod mutation_ordering;
mod polymorphic;
mod single_scalar;
