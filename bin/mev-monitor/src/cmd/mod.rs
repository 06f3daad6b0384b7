pub mod recalc;
pub mod run;
