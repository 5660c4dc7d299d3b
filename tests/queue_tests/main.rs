//! Command queue and retry policy tests

mod queue_tests;
