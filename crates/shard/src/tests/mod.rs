mod helpers;
mod router_tests;
mod stats_tests;
