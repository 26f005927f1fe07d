//! Integration tests for marketx

mod e2e_test;
mod feed_test;
mod portfolio_test;
