//! Turns a human-supplied event URL into one market and its token IDs

use tracing::{info, instrument, warn};
use url::Url;

use super::messages::{GammaEvent, GammaMarket};
use crate::common::errors::{ClientError, ResolutionError};
use crate::common::traits::EventSource;

/// Number of market slugs listed when an event needs disambiguation
const EXAMPLE_SLUGS: usize = 8;

/// What the user asked for
#[derive(Debug, Clone, Default)]
pub struct MarketQuery {
    pub event_url: String,
    /// Case-insensitive fragment of the market question
    pub date_text: Option<String>,
    /// Exact market slug; wins over `date_text`
    pub market_slug: Option<String>,
}

impl MarketQuery {
    pub fn by_date(event_url: impl Into<String>, date_text: impl Into<String>) -> Self {
        Self {
            event_url: event_url.into(),
            date_text: Some(date_text.into()),
            market_slug: None,
        }
    }
}

/// One outcome token and its book channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub label: String,
    pub token_id: String,
}

/// The selected market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMarket {
    pub id: String,
    pub condition_id: Option<String>,
    pub slug: Option<String>,
    pub question: String,
    pub outcomes: Vec<Outcome>,
}

impl ResolvedMarket {
    pub fn token_ids(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.token_id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub event_slug: String,
    pub event_title: String,
    pub market: ResolvedMarket,
    /// Questions of further markets that also matched the date text
    pub other_matches: Vec<String>,
}

/// Resolves queries against an [`EventSource`]
pub struct MarketResolver<'a, S: EventSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: EventSource + ?Sized> MarketResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Fetch the event and select one market. One REST call.
    #[instrument(skip(self), fields(event_url = %query.event_url))]
    pub async fn resolve(&self, query: &MarketQuery) -> Result<Resolution, ResolutionError> {
        let slug = event_slug_from_url(&query.event_url)?;

        let event = match self.source.event_by_slug(&slug).await {
            Ok(event) => event,
            Err(ClientError::NotFound(_)) => return Err(ResolutionError::EventNotFound(slug)),
            Err(e) => return Err(e.into()),
        };

        let selection = select_market(&event, &slug, query)?;
        if !selection.others.is_empty() {
            warn!(
                matches = selection.others.len() + 1,
                chosen = %selection.market.question,
                "several markets match the date text; using the first"
            );
        }

        let market = resolved_market(selection.market)?;
        info!(
            event = %slug,
            market = %market.question,
            tokens = market.outcomes.len(),
            "resolved market"
        );

        Ok(Resolution {
            event_slug: slug,
            event_title: event.title.clone(),
            market,
            other_matches: selection.others,
        })
    }
}

/// Event slug from a URL such as `https://polymarket.com/event/<slug>`.
///
/// Takes the segment after `event` when present, otherwise the last
/// non-empty path segment. Input without a scheme is taken as a bare slug.
pub fn event_slug_from_url(event_url: &str) -> Result<String, ResolutionError> {
    let trimmed = event_url.trim();
    let invalid = || ResolutionError::InvalidEventUrl(event_url.to_string());

    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let bare = trimmed.split(['?', '#']).next().unwrap_or_default();
            let slug = bare.trim_matches('/').rsplit('/').next().unwrap_or_default();
            return if slug.is_empty() {
                Err(invalid())
            } else {
                Ok(slug.to_string())
            };
        }
        Err(_) => return Err(invalid()),
    };

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let slug = match segments.iter().position(|seg| *seg == "event") {
        Some(i) => segments.get(i + 1),
        None => segments.last(),
    }
    .ok_or_else(invalid)?;

    Ok(slug.to_string())
}

/// Result of the selection policy
#[derive(Debug)]
pub struct Selection<'e> {
    pub market: &'e GammaMarket,
    pub others: Vec<String>,
}

/// Pick one market of `event` following the selection policy: exact market
/// slug, then first question containing the date text, then the only
/// market.
pub fn select_market<'e>(
    event: &'e GammaEvent,
    event_slug: &str,
    query: &MarketQuery,
) -> Result<Selection<'e>, ResolutionError> {
    let markets = &event.markets;
    if markets.is_empty() {
        return Err(ResolutionError::NoMarkets(event_slug.to_string()));
    }

    if let Some(wanted) = query.market_slug.as_deref() {
        let wanted = wanted.trim().to_lowercase();
        return markets
            .iter()
            .find(|m| m.slug.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str()))
            .map(|market| Selection {
                market,
                others: Vec::new(),
            })
            .ok_or_else(|| ResolutionError::NoSlugMatch(wanted));
    }

    if let Some(date_text) = query.date_text.as_deref() {
        let needle = date_text.to_lowercase();
        let mut matches = markets
            .iter()
            .filter(|m| m.question.to_lowercase().contains(&needle));

        let market = matches
            .next()
            .ok_or_else(|| ResolutionError::NoDateMatch(date_text.to_string()))?;
        let others = matches.map(|m| m.question.clone()).collect();
        return Ok(Selection { market, others });
    }

    if let [market] = markets.as_slice() {
        return Ok(Selection {
            market,
            others: Vec::new(),
        });
    }

    let examples = markets
        .iter()
        .take(EXAMPLE_SLUGS)
        .map(|m| m.slug.clone().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ResolutionError::Ambiguous {
        count: markets.len(),
        examples,
    })
}

fn resolved_market(market: &GammaMarket) -> Result<ResolvedMarket, ResolutionError> {
    if market.clob_token_ids.is_empty() {
        return Err(ResolutionError::MissingTokenIds(
            market.slug.clone().unwrap_or_else(|| market.id.clone()),
        ));
    }

    let outcomes = market
        .clob_token_ids
        .iter()
        .enumerate()
        .map(|(i, token_id)| Outcome {
            label: market
                .outcomes
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("token_{i}")),
            token_id: token_id.clone(),
        })
        .collect();

    Ok(ResolvedMarket {
        id: market.id.clone(),
        condition_id: market.condition_id.clone(),
        slug: market.slug.clone(),
        question: market.question.clone(),
        outcomes,
    })
}
