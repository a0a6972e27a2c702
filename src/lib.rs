#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod document;
pub mod host;
pub mod logging;
pub mod panel;
pub mod preload;
pub mod ranking;
pub mod screenshot;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tracker;
pub mod url_utils;
pub mod visits;
