pub mod envelope;
pub mod page;
pub mod run;
