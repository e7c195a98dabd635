pub mod enrollment_service;
