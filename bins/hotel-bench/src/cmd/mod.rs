pub mod domain;
pub mod load;
pub mod serve;
pub mod update;
