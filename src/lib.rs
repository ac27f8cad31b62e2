//! savesync: server core for keeping game save directories in sync.
//!
//! A client declares the files it has as a path to content hash map. The
//! server hashes its own copy ([`integrity`]), diffs the two with the client
//! as ground truth ([`sync`]), removes what the client no longer has, and
//! exchanges whole trees as `.tar.gz` archives ([`archive`]). Every applied
//! upload is followed by a rotated backup ([`backup`]).

pub mod api;
pub mod archive;
pub mod backup;
pub mod config;
pub mod integrity;
pub mod ledger;
pub mod metrics;
pub mod service;
pub mod sync;
pub mod tree;
