pub mod gateway;
pub mod generate;
