//! Dubai bus timetable server.
//!
//! Downloads RTA timetable documents per route, keeps them in a persistent
//! cache, extracts stops and departure times, and answers "when is the next
//! bus?" over HTTP.

pub mod cache;
pub mod config;
pub mod documents;
pub mod domain;
pub mod extract;
pub mod next_departure;
pub mod registry;
pub mod web;

#[cfg(test)]
mod test_helpers;
