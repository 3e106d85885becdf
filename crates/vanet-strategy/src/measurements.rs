//! Per-prefix, per-face link measurements
//!
//! Each name prefix owns a [`NamespaceInfo`] mapping faces to [`FaceInfo`]
//! records. Records carry a smoothed RTT estimator, a smoothed Interest
//! satisfaction ratio and raw counters. Every use of a face pushes its
//! expiry forward by the table TTL; [`MeasurementTable::cleanup`] drops
//! records whose TTL lapsed.

use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;

use vanet_core::{FaceId, Name};

/// Default sliding lifetime of a measurement record
pub const DEFAULT_MEASUREMENT_TTL: Duration = Duration::from_secs(300);

/// SRTT bound used to turn a cost into a benefit (`10 - srtt`)
pub const SRTT_CEILING_SECS: f64 = 10.0;

const RTT_ALPHA: f64 = 1.0 / 8.0;
const RTT_BETA: f64 = 1.0 / 4.0;
const RTT_K: f64 = 4.0;
const ISR_WEIGHT: f64 = 0.5;

/// One RTT observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RttSample {
    Measured(Duration),
    Timeout,
}

/// Smoothed RTT estimator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RttEstimator {
    srtt: Option<f64>,
    rttvar: f64,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new sample into the estimate
    pub fn add_measurement(&mut self, rtt: Duration) {
        let rtt = rtt.as_secs_f64();
        match self.srtt {
            None => {
                self.srtt = Some(rtt);
                self.rttvar = rtt / 2.0;
            }
            Some(srtt) => {
                self.rttvar = (1.0 - RTT_BETA) * self.rttvar + RTT_BETA * (srtt - rtt).abs();
                self.srtt = Some((1.0 - RTT_ALPHA) * srtt + RTT_ALPHA * rtt);
            }
        }
    }

    /// Smoothed RTT, if any sample was taken
    pub fn smoothed_rtt(&self) -> Option<Duration> {
        self.srtt.map(Duration::from_secs_f64)
    }

    pub fn rtt_variation(&self) -> Duration {
        Duration::from_secs_f64(self.rttvar)
    }

    /// Retransmission timeout `srtt + 4·rttvar`
    pub fn rto(&self) -> Option<Duration> {
        self.srtt
            .map(|srtt| Duration::from_secs_f64(srtt + RTT_K * self.rttvar))
    }
}

/// Raw per-face counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceCounters {
    pub n_out_interests: u64,
    pub n_satisfied_interests: u64,
}

impl FaceCounters {
    /// Satisfied over sent, 0 when nothing was sent
    pub fn ratio(&self) -> f64 {
        if self.n_out_interests == 0 {
            0.0
        } else {
            self.n_satisfied_interests as f64 / self.n_out_interests as f64
        }
    }
}

/// Measurements for one face under one prefix
#[derive(Debug, Clone, PartialEq)]
pub struct FaceInfo {
    rtt: RttEstimator,
    last_rtt: Option<RttSample>,
    sisr: f64,
    pub counters: FaceCounters,
    expires_at: Duration,
}

impl FaceInfo {
    fn new(expires_at: Duration) -> Self {
        Self {
            rtt: RttEstimator::new(),
            last_rtt: None,
            sisr: -1.0,
            counters: FaceCounters::default(),
            expires_at,
        }
    }

    pub fn record_rtt(&mut self, rtt: Duration) {
        self.rtt.add_measurement(rtt);
        self.last_rtt = Some(RttSample::Measured(rtt));
    }

    pub fn record_timeout(&mut self) {
        self.last_rtt = Some(RttSample::Timeout);
    }

    /// Blend a new satisfaction ratio into the smoothed value
    ///
    /// The first sample replaces the initial `-1`.
    pub fn record_isr(&mut self, isr: f64) {
        self.sisr = if self.sisr < 0.0 {
            isr
        } else {
            ISR_WEIGHT * isr + (1.0 - ISR_WEIGHT) * self.sisr
        };
    }

    /// Smoothed satisfaction ratio, `-1` before any sample
    pub fn smoothed_isr(&self) -> f64 {
        self.sisr
    }

    pub fn srtt(&self) -> Option<Duration> {
        self.rtt.smoothed_rtt()
    }

    pub fn rto(&self) -> Option<Duration> {
        self.rtt.rto()
    }

    pub fn last_rtt(&self) -> Option<RttSample> {
        self.last_rtt
    }

    /// SRTT turned into a benefit metric
    pub fn positive_srtt(&self) -> f64 {
        SRTT_CEILING_SECS - self.srtt().map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    pub fn expires_at(&self) -> Duration {
        self.expires_at
    }
}

/// All face measurements under one prefix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceInfo {
    faces: HashMap<FaceId, FaceInfo>,
    expires_at: Duration,
}

impl NamespaceInfo {
    pub fn face(&self, face: FaceId) -> Option<&FaceInfo> {
        self.faces.get(&face)
    }

    pub fn faces(&self) -> impl Iterator<Item = (&FaceId, &FaceInfo)> {
        self.faces.iter()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Metric pair used when ranking a face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkMetrics {
    pub sisr: f64,
    pub positive_srtt: f64,
}

impl LinkMetrics {
    /// Neutral values for a face never measured
    pub const UNKNOWN: LinkMetrics = LinkMetrics {
        sisr: 0.0,
        positive_srtt: 0.0,
    };
}

/// Measurement store keyed by name prefix
pub struct MeasurementTable {
    namespaces: DashMap<Name, NamespaceInfo>,
    ttl: Duration,
}

impl MeasurementTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            namespaces: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Update (creating if needed) the record for `face` under `prefix`
    ///
    /// Both the face record and its namespace have their expiry extended.
    pub fn update<R>(
        &self,
        prefix: &Name,
        face: FaceId,
        now: Duration,
        f: impl FnOnce(&mut FaceInfo) -> R,
    ) -> R {
        let expires_at = now + self.ttl;
        let mut ns = self.namespaces.entry(prefix.clone()).or_default();
        ns.expires_at = expires_at;
        let info = ns
            .faces
            .entry(face)
            .or_insert_with(|| FaceInfo::new(expires_at));
        info.expires_at = expires_at;
        f(info)
    }

    /// Update an existing record found by longest-prefix match on `name`
    ///
    /// Returns `None` (and creates nothing) when no record exists.
    pub fn update_existing<R>(
        &self,
        name: &Name,
        face: FaceId,
        now: Duration,
        f: impl FnOnce(&mut FaceInfo) -> R,
    ) -> Option<R> {
        let prefix = self.longest_match(name)?;
        let mut ns = self.namespaces.get_mut(&prefix)?;
        let expires_at = now + self.ttl;
        let info = ns.faces.get_mut(&face)?;
        info.expires_at = expires_at;
        let result = f(info);
        ns.expires_at = expires_at;
        Some(result)
    }

    /// Copy of the record for `face` under exactly `prefix`
    pub fn face_info(&self, prefix: &Name, face: FaceId) -> Option<FaceInfo> {
        self.namespaces
            .get(prefix)
            .and_then(|ns| ns.faces.get(&face).cloned())
    }

    /// Ranking metrics for `face` at `now`, neutral when unmeasured or lapsed
    pub fn link_metrics(&self, prefix: &Name, face: FaceId, now: Duration) -> LinkMetrics {
        self.face_info(prefix, face)
            .filter(|info| info.expires_at() > now)
            .map(|info| LinkMetrics {
                sisr: info.smoothed_isr(),
                positive_srtt: info.positive_srtt(),
            })
            .unwrap_or(LinkMetrics::UNKNOWN)
    }

    /// Longest stored prefix of `name`
    pub fn longest_match(&self, name: &Name) -> Option<Name> {
        (0..=name.len())
            .rev()
            .map(|n| name.prefix(n))
            .find(|p| self.namespaces.contains_key(p))
    }

    pub fn namespace(&self, prefix: &Name) -> Option<NamespaceInfo> {
        self.namespaces.get(prefix).map(|ns| ns.clone())
    }

    /// Fold every face's counters into its smoothed ratio and reset them
    pub fn refresh_isr(&self) {
        for mut ns in self.namespaces.iter_mut() {
            for info in ns.faces.values_mut() {
                let isr = info.counters.ratio();
                info.record_isr(isr);
                info.counters = FaceCounters::default();
            }
        }
    }

    /// Drop records whose lifetime lapsed
    ///
    /// Returns the number of face records removed.
    pub fn cleanup(&self, now: Duration) -> usize {
        let mut removed = 0;

        self.namespaces.retain(|_, ns| {
            let before = ns.faces.len();
            ns.faces.retain(|_, info| info.expires_at > now);
            removed += before - ns.faces.len();
            !ns.faces.is_empty() || ns.expires_at > now
        });

        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.namespaces.len(),
                "Cleaned up expired measurements"
            );
        }

        removed
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }
}

impl Default for MeasurementTable {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_prefix() -> Name {
        "/ustc".parse().unwrap()
    }

    #[test]
    fn test_rtt_first_sample() {
        let mut est = RttEstimator::new();
        est.add_measurement(Duration::from_millis(100));
        assert_eq!(est.smoothed_rtt(), Some(Duration::from_millis(100)));
        assert_eq!(est.rtt_variation(), Duration::from_millis(50));
        assert_eq!(est.rto(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_rtt_smoothing() {
        let mut est = RttEstimator::new();
        est.add_measurement(Duration::from_millis(100));
        est.add_measurement(Duration::from_millis(200));
        // srtt = 7/8*100 + 1/8*200, rttvar = 3/4*50 + 1/4*100
        let srtt = est.smoothed_rtt().unwrap().as_secs_f64();
        assert!((srtt - 0.1125).abs() < 1e-9);
        assert!((est.rtt_variation().as_secs_f64() - 0.0625).abs() < 1e-9);
    }

    #[test]
    fn test_isr_smoothing() {
        let mut info = FaceInfo::new(Duration::ZERO);
        assert_eq!(info.smoothed_isr(), -1.0);
        info.record_isr(0.5);
        assert_eq!(info.smoothed_isr(), 0.5);
        info.record_isr(1.0);
        assert_eq!(info.smoothed_isr(), 0.75);
    }

    #[test]
    fn test_unmeasured_face_is_neutral() {
        let table = MeasurementTable::default();
        assert_eq!(
            table.link_metrics(&make_prefix(), FaceId(257), Duration::ZERO),
            LinkMetrics::UNKNOWN
        );
    }

    #[test]
    fn test_update_and_metrics() {
        let table = MeasurementTable::default();
        let prefix = make_prefix();
        table.update(&prefix, FaceId(257), Duration::ZERO, |info| {
            info.counters.n_out_interests += 1;
            info.record_rtt(Duration::from_secs(2));
        });
        let metrics = table.link_metrics(&prefix, FaceId(257), Duration::ZERO);
        assert_eq!(metrics.positive_srtt, 8.0);
        assert_eq!(metrics.sisr, -1.0);
    }

    #[test]
    fn test_lapsed_record_is_neutral() {
        let table = MeasurementTable::new(Duration::from_secs(10));
        let prefix = make_prefix();
        table.update(&prefix, FaceId(257), Duration::ZERO, |info| {
            info.record_isr(1.0);
            info.record_rtt(Duration::from_millis(100));
        });

        let fresh = table.link_metrics(&prefix, FaceId(257), Duration::from_secs(9));
        assert_eq!(fresh.sisr, 1.0);
        assert!((fresh.positive_srtt - 9.9).abs() < 1e-9);

        // Not yet collected, but no longer trusted
        let stale = table.link_metrics(&prefix, FaceId(257), Duration::from_secs(10));
        assert_eq!(stale, LinkMetrics::UNKNOWN);
        assert!(table.face_info(&prefix, FaceId(257)).is_some());
    }

    #[test]
    fn test_update_existing_uses_longest_match() {
        let table = MeasurementTable::default();
        let prefix = make_prefix();
        let name: Name = "/ustc/video/1".parse().unwrap();

        assert!(table
            .update_existing(&name, FaceId(257), Duration::ZERO, |_| ())
            .is_none());

        table.update(&prefix, FaceId(257), Duration::ZERO, |_| ());
        let satisfied = table.update_existing(&name, FaceId(257), Duration::ZERO, |info| {
            info.counters.n_satisfied_interests += 1;
            info.counters.n_satisfied_interests
        });
        assert_eq!(satisfied, Some(1));
        assert!(table
            .update_existing(&name, FaceId(258), Duration::ZERO, |_| ())
            .is_none());
    }

    #[test]
    fn test_refresh_isr_resets_counters() {
        let table = MeasurementTable::default();
        let prefix = make_prefix();
        table.update(&prefix, FaceId(257), Duration::ZERO, |info| {
            info.counters.n_out_interests = 4;
            info.counters.n_satisfied_interests = 3;
        });
        table.refresh_isr();
        let info = table.face_info(&prefix, FaceId(257)).unwrap();
        assert_eq!(info.smoothed_isr(), 0.75);
        assert_eq!(info.counters, FaceCounters::default());
    }

    #[test]
    fn test_cleanup_sliding_ttl() {
        let table = MeasurementTable::new(Duration::from_secs(10));
        let prefix = make_prefix();
        table.update(&prefix, FaceId(257), Duration::ZERO, |_| ());
        table.update(&prefix, FaceId(258), Duration::from_secs(8), |_| ());

        assert_eq!(table.cleanup(Duration::from_secs(5)), 0);
        assert_eq!(table.cleanup(Duration::from_secs(12)), 1);
        assert!(table.face_info(&prefix, FaceId(258)).is_some());
        assert_eq!(table.cleanup(Duration::from_secs(20)), 1);
        assert_eq!(table.namespace_count(), 0);
    }
}
