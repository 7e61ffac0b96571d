pub mod aggregator;
pub mod coordinator;
pub mod forecast_fetcher;
pub mod orchestrator;
pub mod power_model;
pub mod sensors;

#[cfg(test)]
pub mod testing;
