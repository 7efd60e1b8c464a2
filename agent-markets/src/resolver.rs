//! Market resolution: any [`MarketRef`] in, normalized [`MarketSnapshot`] out

use crate::client::MarketsClient;
use crate::types::GammaMarket;
use agent_core::{AgentError, AgentResult, MarketRef, MarketSnapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// How long a resolved snapshot stays fresh before the catalog is re-queried
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    fetched_at: Instant,
    snapshot: MarketSnapshot,
}

/// Resolves market references against the catalog, with a short-lived cache
/// keyed by reference so repeated risk checks do not hammer the API.
pub struct MarketResolver {
    client: MarketsClient,
    cache: Mutex<HashMap<String, CacheEntry>>,
    cache_ttl: Duration,
}

impl MarketResolver {
    pub fn new(client: MarketsClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Resolve a market reference to a snapshot.
    ///
    /// Every reference variant is dispatched explicitly; adding a variant to
    /// [`MarketRef`] forces a decision here.
    #[instrument(skip(self))]
    pub async fn resolve(&self, market: &MarketRef) -> AgentResult<MarketSnapshot> {
        let key = market.cache_key();

        if let Some(snapshot) = self.cached(&key) {
            debug!("Resolved {} from cache", market);
            return Ok(snapshot);
        }

        let raw = match market {
            // A bare id shaped like an address is most likely a maker
            // address; try that first and fall back to a direct id lookup
            MarketRef::Id(id) if looks_like_maker_address(id) => {
                match self.client.get_market_by_maker_address(id).await {
                    Ok(raw) => raw,
                    Err(AgentError::NotFound(_)) => self.client.get_market_by_id(id).await?,
                    Err(e) => return Err(e),
                }
            }
            MarketRef::Id(id) => self.client.get_market_by_id(id).await?,
            MarketRef::Slug(slug) => self.client.get_market_by_slug(slug).await?,
            MarketRef::ConditionId(cid) => self.client.get_market_by_condition_id(cid).await?,
            MarketRef::MakerAddress(addr) => self.client.get_market_by_maker_address(addr).await?,
        };

        let snapshot = snapshot_from(raw)?;

        self.cache.lock().insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                snapshot: snapshot.clone(),
            },
        );

        Ok(snapshot)
    }

    /// Drop all cached snapshots.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    fn cached(&self, key: &str) -> Option<MarketSnapshot> {
        let cache = self.cache.lock();
        let entry = cache.get(key)?;
        if entry.fetched_at.elapsed() < self.cache_ttl {
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }
}

fn looks_like_maker_address(id: &str) -> bool {
    id.strip_prefix("0x")
        .map_or(false, |hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Convert a raw catalog market into the snapshot the pipeline consumes.
///
/// A market without both outcome token ids cannot be traded on the CLOB, so
/// that case is a hard error rather than a partially-filled snapshot.
pub fn snapshot_from(market: GammaMarket) -> AgentResult<MarketSnapshot> {
    let (yes_token_id, no_token_id) = market
        .parse_clob_token_ids()
        .ok_or_else(|| AgentError::token_ids_unavailable(&market.id))?;

    Ok(MarketSnapshot {
        liquidity: market.parse_liquidity(),
        volume_24h: market.parse_volume_24h(),
        best_bid: market.parse_best_bid(),
        best_ask: market.parse_best_ask(),
        id: market.id,
        title: market.question,
        condition_id: market.condition_id,
        yes_token_id,
        no_token_id,
        created_at: market.created_at,
        active: market.active.unwrap_or(false),
        closed: market.closed.unwrap_or(false),
        category: market.category,
        neg_risk: market.neg_risk.unwrap_or(false),
    })
}
