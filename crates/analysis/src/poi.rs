use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use common::Direction;

use crate::config::AnalysisConfig;
use crate::range::PriceRange;
use crate::structure::StructureEvent;
use crate::zones::{Zone, ZoneKind};

/// Price area where several structures agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub range: PriceRange,
    pub direction: Direction,
    /// Number of structure events in the cluster. Never zero.
    pub weight: usize,
    /// Indices of the contributing events, ascending.
    pub events: Vec<usize>,
    /// Zones overlapping the cluster. Informational only.
    pub zones: Vec<ZoneKind>,
    /// Latest `confirmed_at` among the contributing events.
    pub latest_confirmed_at: usize,
}

impl PointOfInterest {
    /// Whether `price` is inside the POI or within `tolerance_pct` percent of
    /// it.
    pub fn is_near(&self, price: f64, tolerance_pct: f64) -> bool {
        self.range.distance_to(price) <= price.abs() * tolerance_pct / 100.0
    }
}

/// Cluster overlapping event ranges into POIs.
///
/// Events are taken in order of their lower bound and merged greedily while
/// they overlap the open cluster and the merged width stays within
/// `poi_max_width` percent. Zones never extend a cluster; they are attached
/// to every finished cluster they overlap.
///
/// Result is ordered by weight, then recency, then price.
pub fn compute_poi(
    events: &[StructureEvent],
    zones: &[Zone],
    config: &AnalysisConfig,
) -> Vec<PointOfInterest> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&events[a].range, &events[b].range);
        ra.low
            .total_cmp(&rb.low)
            .then(ra.high.total_cmp(&rb.high))
            .then(a.cmp(&b))
    });

    let mut clusters: Vec<(PriceRange, Vec<usize>)> = Vec::new();
    for id in order {
        let range = events[id].range;
        match clusters.last_mut() {
            Some((open, members))
                if range.low <= open.high && open.union(&range).width_pct() <= config.poi_max_width =>
            {
                *open = open.union(&range);
                members.push(id);
            }
            _ => clusters.push((range, vec![id])),
        }
    }

    let mut pois: Vec<PointOfInterest> = clusters
        .into_iter()
        .map(|(range, mut members)| {
            members.sort_unstable();
            build(events, zones, range, members)
        })
        .collect();

    pois.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then(b.latest_confirmed_at.cmp(&a.latest_confirmed_at))
            .then(a.range.low.total_cmp(&b.range.low))
    });
    pois
}

fn build(
    events: &[StructureEvent],
    zones: &[Zone],
    range: PriceRange,
    members: Vec<usize>,
) -> PointOfInterest {
    let bullish = members
        .iter()
        .filter(|&&m| events[m].direction == Direction::Bullish)
        .count();
    let bearish = members.len() - bullish;
    // Latest confirmation wins, then the later event on a tie.
    let latest = members
        .iter()
        .copied()
        .max_by_key(|&m| (events[m].confirmed_at, m))
        .unwrap_or_default();
    let direction = match bullish.cmp(&bearish) {
        Ordering::Greater => Direction::Bullish,
        Ordering::Less => Direction::Bearish,
        Ordering::Equal => events[latest].direction,
    };

    PointOfInterest {
        range,
        direction,
        weight: members.len(),
        zones: zones
            .iter()
            .filter(|z| z.range.overlaps(&range))
            .map(|z| z.kind)
            .collect(),
        latest_confirmed_at: events[latest].confirmed_at,
        events: members,
    }
}
