pub mod eligibility_service;
