pub mod desk;
pub mod order_builder;
pub mod presenter;
pub mod validation;

#[cfg(test)]
mod order_builder_tests;
