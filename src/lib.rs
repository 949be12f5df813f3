pub mod attachments;
pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod services;
pub mod web;
