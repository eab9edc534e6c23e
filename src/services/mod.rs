pub mod driver_service;
