//! Service-level tests against in-memory fakes.


mod decision_tests;
mod flow_tests;
mod recovery_tests;
mod scheduler_tests;
mod worker_tests;
