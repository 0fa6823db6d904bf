//! Integration tests for ssc-state, driven by the in-memory device emulator

mod cli_commands;
mod discovery;
mod end_to_end;
mod fingerprint_gate;
mod per_device_isolation;
mod support;
