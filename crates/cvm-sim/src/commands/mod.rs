pub mod args;
pub mod fit;
pub mod ordered;
pub mod run;
