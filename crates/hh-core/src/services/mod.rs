pub mod docker;
pub mod git;
pub mod host;
pub mod ledger;
pub mod mutator;
pub mod rewrite;
pub mod routing;
