//! Compile-time defaults
//!
//! Generated by build.rs from the library defaults, merged with the file
//! named by `GVF_CONFIG_RS` when that is set at build time.

include!(concat!(env!("OUT_DIR"), "/gvf_merged_config.rs"));
