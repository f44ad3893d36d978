pub mod migrate;
pub mod naming;
pub mod smms;
