//! DNS-01 challenge solver for cert-manager backed by the All-Inkl KAS API.
//!
//! The [`solver::AllinklSolver`] publishes the challenge TXT record on
//! Present and removes it by identifier on CleanUp. Provider access goes
//! through [`dns::DnsProvider`], secret lookup through
//! [`secrets::SecretStore`].

pub mod config;
pub mod daemon;
pub mod dns;
pub mod error;
pub mod secrets;
pub mod solver;
