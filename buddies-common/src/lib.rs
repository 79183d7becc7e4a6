#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod db;
pub mod models;
pub mod realtime;
pub mod request_io;
pub mod schema;
pub mod social;
pub mod token;
pub mod validators;
