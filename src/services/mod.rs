pub mod aggregator;
pub mod derived;
pub mod dune;
pub mod extract;
pub mod insights;
pub mod protocols;
pub mod report;
pub mod safe_math;
pub mod table;
