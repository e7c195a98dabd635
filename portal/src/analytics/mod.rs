pub mod analytics_service;
