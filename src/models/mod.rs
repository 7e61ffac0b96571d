pub mod array;
pub mod dashboard;
pub mod forecast;
