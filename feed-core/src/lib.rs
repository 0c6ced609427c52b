//! Core types for the esports data-acquisition layer
//!
//! This crate defines the shared data structures used across the workspace:
//! capabilities, typed records, fetch results with provenance, health
//! snapshots and the error taxonomy.

pub mod capability;
pub mod error;
pub mod health;
pub mod params;
pub mod records;
pub mod source;

pub use capability::{region_name, Capability, Game, REGIONS};
pub use error::{
    AcquisitionError, AcquisitionResult, CacheError, ConfigError, FailureKind, FetchError,
    SourceFailure,
};
pub use health::{AggregateHealth, HealthBand, HealthPolicy, HealthProbeResult, ProbeSpec};
pub use params::FetchParams;
pub use records::{Decoded, Event, MatchResult, Payload, PlayerStats, TeamRanking, UpcomingMatch};
pub use source::{FetchResult, SourceDescriptor};
