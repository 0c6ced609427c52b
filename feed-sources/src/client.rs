//! The capability interface implemented by every upstream adapter

use async_trait::async_trait;
use feed_core::{
    Capability, Event, FetchError, FetchParams, MatchResult, Payload, PlayerStats,
    SourceDescriptor, TeamRanking, UpcomingMatch,
};
use serde_json::Value;
use tracing::{debug, warn};

/// An upstream source of esports data
///
/// Adapters implement [`SourceClient::fetch`] for whichever capabilities they
/// support and return [`FetchError::Unsupported`] for the rest. A call
/// returning zero records is a success, not an error.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Fetch the records for one capability
    async fn fetch(
        &self,
        capability: Capability,
        params: &FetchParams,
    ) -> Result<Payload, FetchError>;

    async fn fetch_upcoming(&self, params: &FetchParams) -> Result<Vec<UpcomingMatch>, FetchError> {
        let payload = self.fetch(Capability::FetchUpcoming, params).await?;
        expect_shape(Capability::FetchUpcoming, payload, Payload::into_upcoming)
    }

    async fn fetch_results(&self, params: &FetchParams) -> Result<Vec<MatchResult>, FetchError> {
        let payload = self.fetch(Capability::FetchResults, params).await?;
        expect_shape(Capability::FetchResults, payload, Payload::into_results)
    }

    async fn fetch_rankings(&self, params: &FetchParams) -> Result<Vec<TeamRanking>, FetchError> {
        let payload = self.fetch(Capability::FetchRankings, params).await?;
        expect_shape(Capability::FetchRankings, payload, Payload::into_rankings)
    }

    async fn fetch_player_stats(
        &self,
        params: &FetchParams,
    ) -> Result<Vec<PlayerStats>, FetchError> {
        let payload = self.fetch(Capability::FetchPlayerStats, params).await?;
        expect_shape(Capability::FetchPlayerStats, payload, Payload::into_player_stats)
    }

    async fn fetch_events(&self, params: &FetchParams) -> Result<Vec<Event>, FetchError> {
        let payload = self.fetch(Capability::FetchEvents, params).await?;
        expect_shape(Capability::FetchEvents, payload, Payload::into_events)
    }
}

fn expect_shape<T>(
    capability: Capability,
    payload: Payload,
    extract: fn(Payload) -> Option<T>,
) -> Result<T, FetchError> {
    let actual = payload.capability();
    extract(payload).ok_or_else(|| {
        FetchError::parse(format!(
            "expected {} records, source returned {}",
            capability, actual
        ))
    })
}

/// Reject requests a source is not configured for
pub(crate) fn ensure_supported(
    descriptor: &SourceDescriptor,
    capability: Capability,
    params: &FetchParams,
) -> Result<(), FetchError> {
    if descriptor.supports(capability, params.game) {
        Ok(())
    } else {
        Err(FetchError::Unsupported(capability))
    }
}

/// Decode raw records, skipping malformed ones
///
/// Fails only when there was input and none of it decoded.
pub(crate) fn decode_records(
    source_name: &str,
    capability: Capability,
    records: Vec<Value>,
) -> Result<Payload, FetchError> {
    let decoded = Payload::decode(capability, records);
    if decoded.all_rejected() {
        return Err(FetchError::parse(format!(
            "all {} {} records malformed: {}",
            decoded.skipped,
            capability,
            decoded.first_error.unwrap_or_default()
        )));
    }
    if decoded.skipped > 0 {
        warn!(
            "{} skipped {} malformed {} records: {}",
            source_name,
            decoded.skipped,
            capability,
            decoded.first_error.as_deref().unwrap_or_default()
        );
    }

    debug!(
        "{} returned {} {} records",
        source_name,
        decoded.payload.len(),
        capability
    );
    Ok(decoded.payload)
}
