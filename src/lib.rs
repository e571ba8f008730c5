pub mod logger;
pub mod settings;

pub mod domain_model;
pub mod domain_port;

pub mod sync;

pub mod application_impl;
