pub mod members_service;
