//! Weekly school timetable grids: placement validation, scoped clearing and
//! externally generated class schedules, served over HTTP.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod form;
pub mod generator;
pub mod schedule;
pub mod service;
pub mod store;
pub mod web;

pub use error::ScheduleError;
pub use service::ScheduleService;
