// src/transport/mod.rs

//! Network front ends. TCP is the only transport; the connection pipeline
//! itself is transport-generic.

pub mod tcp;
