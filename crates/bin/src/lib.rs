#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod args;
pub mod bin_util;
pub mod entry;
pub mod logging;
pub mod settings;

mod main_impl;
pub use main_impl::do_main;
