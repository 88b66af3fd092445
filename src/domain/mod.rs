//! Core domain types and logic: indicators, rules, screens, the scanner and
//! report formatting.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_helpers;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod market;
pub mod screen;
pub mod universe;
pub mod matches;
pub mod scanner;
pub mod report;
pub mod config_validation;
pub mod error;
