mod common;
mod fanout_tests;
mod wait_tests;
