pub mod production_service;
pub mod solar_algorithm;
pub mod time_range;
