mod helpers;

mod expire_tests;
mod reclaim_tests;
mod string_tests;
