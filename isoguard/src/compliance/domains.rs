//! Voltage domain classification
//!
//! Assigns board nets to configured voltage domains. Net classes are
//! matched first across all domains, then net-name patterns for the nets
//! still unassigned. Within each pass the first domain in configuration
//! order wins. Unmatched nets take no part in any check.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::board::{Feature, FeatureId, FeatureProvider};
use crate::config::{ConfigError, IsolationConfig};
use crate::geometry::{is_self_intersecting, signed_area, EPSILON};

pub type DomainId = usize;

/// A named voltage region, immutable for the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageDomain {
    pub id: DomainId,
    pub name: String,
    pub voltage: f64,
    pub reinforced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    NetClass,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetAssignment {
    pub domain: DomainId,
    pub source: MatchSource,
}

/// Per-domain view for the classification report
#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub name: String,
    pub voltage: f64,
    pub reinforced: bool,
    pub nets_from_class: Vec<String>,
    pub nets_from_pattern: Vec<String>,
    pub feature_count: usize,
}

/// Net to domain assignment for one board
#[derive(Debug, Clone)]
pub struct DomainMap {
    domains: Vec<VoltageDomain>,
    nets: BTreeMap<String, NetAssignment>,
    features: Vec<Vec<FeatureId>>,
    degenerate: HashSet<FeatureId>,
}

impl DomainMap {
    /// Classify every net on the board
    ///
    /// Fails only on malformed domain definitions.
    pub fn classify(
        config: &IsolationConfig,
        board: &dyn FeatureProvider,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let domains: Vec<VoltageDomain> = config
            .voltage_domains
            .iter()
            .enumerate()
            .map(|(id, d)| VoltageDomain {
                id,
                name: d.name.clone(),
                voltage: d.voltage_rms,
                reinforced: d.requires_reinforced_insulation,
            })
            .collect();

        let class_tags: Vec<Option<String>> = config
            .voltage_domains
            .iter()
            .map(|d| {
                d.net_class
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_uppercase)
            })
            .collect();
        let patterns: Vec<Vec<String>> = config
            .voltage_domains
            .iter()
            .map(|d| d.net_patterns.iter().map(|p| p.to_uppercase()).collect())
            .collect();

        let mut nets = BTreeMap::new();
        let board_nets = board.nets();

        for net in &board_nets {
            let Some(classes) = board.net_class(net) else {
                continue;
            };
            let classes: Vec<String> = classes
                .split(',')
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
            let hit = class_tags
                .iter()
                .position(|tag| tag.as_ref().is_some_and(|t| classes.contains(t)));
            if let Some(domain) = hit {
                nets.insert(
                    net.to_string(),
                    NetAssignment {
                        domain,
                        source: MatchSource::NetClass,
                    },
                );
            }
        }

        for net in &board_nets {
            if net.is_empty() || nets.contains_key(*net) {
                continue;
            }
            let upper = net.to_uppercase();
            let hit = patterns
                .iter()
                .position(|ps| ps.iter().any(|p| upper.contains(p.as_str())));
            if let Some(domain) = hit {
                nets.insert(
                    net.to_string(),
                    NetAssignment {
                        domain,
                        source: MatchSource::Pattern,
                    },
                );
            }
        }

        let mut features = vec![Vec::new(); domains.len()];
        let mut degenerate = HashSet::new();
        for feature in board.features() {
            if is_degenerate(feature) {
                tracing::warn!(
                    "Skipping degenerate {} {} on {} (net {:?})",
                    feature.kind,
                    feature.id,
                    feature.layer,
                    feature.net
                );
                degenerate.insert(feature.id);
                continue;
            }
            let assigned = feature.net.as_deref().and_then(|n| nets.get(n));
            if let Some(a) = assigned {
                features[a.domain].push(feature.id);
            }
        }

        let map = Self {
            domains,
            nets,
            features,
            degenerate,
        };

        for domain in &map.domains {
            tracing::debug!(
                "Domain {} ({} V): {} net(s), {} feature(s)",
                domain.name,
                domain.voltage,
                map.nets.values().filter(|a| a.domain == domain.id).count(),
                map.features[domain.id].len()
            );
        }
        tracing::info!(
            "Assigned {} of {} nets to {} voltage domain(s)",
            map.nets.len(),
            board_nets.len(),
            map.domains.len()
        );

        Ok(map)
    }

    pub fn domains(&self) -> &[VoltageDomain] {
        &self.domains
    }

    pub fn domain(&self, id: DomainId) -> &VoltageDomain {
        &self.domains[id]
    }

    pub fn assignment(&self, net: &str) -> Option<NetAssignment> {
        self.nets.get(net).copied()
    }

    /// Owning domain of a feature, `None` if unmatched or degenerate
    pub fn domain_of(&self, feature: &Feature) -> Option<DomainId> {
        if self.degenerate.contains(&feature.id) {
            return None;
        }
        feature
            .net
            .as_deref()
            .and_then(|n| self.nets.get(n))
            .map(|a| a.domain)
    }

    pub fn features_of(&self, domain: DomainId) -> &[FeatureId] {
        &self.features[domain]
    }

    pub fn is_degenerate(&self, id: FeatureId) -> bool {
        self.degenerate.contains(&id)
    }

    pub fn degenerate_count(&self) -> usize {
        self.degenerate.len()
    }

    /// Unordered pairs of domains that both own at least one feature
    pub fn pairs(&self) -> Vec<(DomainId, DomainId)> {
        let mut pairs = Vec::new();
        for a in 0..self.domains.len() {
            for b in (a + 1)..self.domains.len() {
                if self.features[a].is_empty() || self.features[b].is_empty() {
                    tracing::debug!(
                        "Pair {} <-> {} has no copper on one side, not checked",
                        self.domains[a].name,
                        self.domains[b].name
                    );
                    continue;
                }
                pairs.push((a, b));
            }
        }
        pairs
    }

    pub fn summary(&self) -> Vec<DomainSummary> {
        let mut by_domain: HashMap<DomainId, (Vec<String>, Vec<String>)> = HashMap::new();
        for (net, a) in &self.nets {
            let entry = by_domain.entry(a.domain).or_default();
            match a.source {
                MatchSource::NetClass => entry.0.push(net.clone()),
                MatchSource::Pattern => entry.1.push(net.clone()),
            }
        }
        self.domains
            .iter()
            .map(|d| {
                let (nets_from_class, nets_from_pattern) =
                    by_domain.remove(&d.id).unwrap_or_default();
                DomainSummary {
                    name: d.name.clone(),
                    voltage: d.voltage,
                    reinforced: d.reinforced,
                    nets_from_class,
                    nets_from_pattern,
                    feature_count: self.features[d.id].len(),
                }
            })
            .collect()
    }
}

/// Outlines that cannot be measured: two vertices, zero area or self-crossing
pub fn is_degenerate(feature: &Feature) -> bool {
    match feature.geometry.len() {
        0 | 2 => true,
        1 => false,
        _ => {
            signed_area(&feature.geometry).abs() <= EPSILON
                || is_self_intersecting(&feature.geometry)
        }
    }
}
