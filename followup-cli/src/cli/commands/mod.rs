pub mod ledger;
pub mod run;
