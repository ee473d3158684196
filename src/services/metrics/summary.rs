//! Summary collectors for the prometheus registry.
//!
//! The prometheus crate ships counters, gauges and histograms only. These types
//! expose `SUMMARY` families with cumulative count and sum, and quantiles
//! computed exactly over the most recent observations of each child.

use prometheus::core::{Collector, Desc};
use prometheus::{proto, Opts};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Quantile objectives with their allowed rank error
pub const DEFAULT_OBJECTIVES: [(f64, f64); 3] = [(0.5, 0.05), (0.9, 0.01), (0.99, 0.001)];

/// Observations kept per child for quantile estimation
pub const WINDOW_SIZE: usize = 500;

#[derive(Debug, Default)]
struct SummaryCore {
    window: VecDeque<f64>,
    count: u64,
    sum: f64,
}

impl SummaryCore {
    fn observe(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        if self.window.len() == WINDOW_SIZE {
            self.window.pop_front();
        }
        self.window.push_back(v);
    }

    fn quantiles(&self, objectives: &[(f64, f64)]) -> Vec<proto::Quantile> {
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        objectives
            .iter()
            .map(|(phi, _)| {
                let mut q = proto::Quantile::default();
                q.set_quantile(*phi);
                q.set_value(rank_value(&sorted, *phi));
                q
            })
            .collect()
    }

    fn to_proto(&self, objectives: &[(f64, f64)], labels: Vec<proto::LabelPair>) -> proto::Metric {
        let mut summary = proto::Summary::default();
        summary.set_sample_count(self.count);
        summary.set_sample_sum(self.sum);
        summary.set_quantile(self.quantiles(objectives).into());

        let mut metric = proto::Metric::default();
        metric.set_label(labels.into());
        metric.set_summary(summary);
        metric
    }
}

fn rank_value(sorted: &[f64], phi: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (phi * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn label_pairs(desc: &Desc, values: &[String]) -> Vec<proto::LabelPair> {
    let mut pairs = desc.const_label_pairs.clone();
    for (name, value) in desc.variable_labels.iter().zip(values) {
        let mut pair = proto::LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        pairs.push(pair);
    }
    pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));
    pairs
}

fn family(desc: &Desc, metrics: Vec<proto::Metric>) -> proto::MetricFamily {
    let mut mf = proto::MetricFamily::default();
    mf.set_name(desc.fq_name.clone());
    mf.set_help(desc.help.clone());
    mf.set_field_type(proto::MetricType::SUMMARY);
    mf.set_metric(metrics.into());
    mf
}

/// Unlabelled summary
#[derive(Debug, Clone)]
pub struct Summary {
    desc: Desc,
    core: Arc<Mutex<SummaryCore>>,
}

impl Summary {
    pub fn new(opts: Opts) -> prometheus::Result<Self> {
        let desc = Desc::new(
            opts.fq_name(),
            opts.help.clone(),
            Vec::new(),
            opts.const_labels.clone(),
        )?;
        Ok(Self {
            desc,
            core: Arc::default(),
        })
    }

    pub fn observe(&self, v: f64) {
        self.core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(v);
    }

    pub fn sample_count(&self) -> u64 {
        self.core.lock().unwrap_or_else(PoisonError::into_inner).count
    }

    pub fn sample_sum(&self) -> f64 {
        self.core.lock().unwrap_or_else(PoisonError::into_inner).sum
    }
}

impl Collector for Summary {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
        let metric = core.to_proto(&DEFAULT_OBJECTIVES, label_pairs(&self.desc, &[]));
        vec![family(&self.desc, vec![metric])]
    }
}

/// Summary partitioned by label values
#[derive(Debug, Clone)]
pub struct SummaryVec {
    desc: Desc,
    children: Arc<RwLock<HashMap<Vec<String>, Arc<Mutex<SummaryCore>>>>>,
}

/// One labelled child of a [`SummaryVec`]
#[derive(Debug, Clone)]
pub struct SummaryChild {
    core: Arc<Mutex<SummaryCore>>,
}

impl SummaryChild {
    pub fn observe(&self, v: f64) {
        self.core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(v);
    }

    pub fn sample_count(&self) -> u64 {
        self.core.lock().unwrap_or_else(PoisonError::into_inner).count
    }

    pub fn sample_sum(&self) -> f64 {
        self.core.lock().unwrap_or_else(PoisonError::into_inner).sum
    }
}

impl SummaryVec {
    pub fn new(opts: Opts, label_names: &[&str]) -> prometheus::Result<Self> {
        let desc = Desc::new(
            opts.fq_name(),
            opts.help.clone(),
            label_names.iter().map(|name| name.to_string()).collect(),
            opts.const_labels.clone(),
        )?;
        Ok(Self {
            desc,
            children: Arc::default(),
        })
    }

    pub fn with_label_values(&self, values: &[&str]) -> prometheus::Result<SummaryChild> {
        if values.len() != self.desc.variable_labels.len() {
            return Err(prometheus::Error::InconsistentCardinality {
                expect: self.desc.variable_labels.len(),
                got: values.len(),
            });
        }

        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        if let Some(core) = self
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(SummaryChild { core: core.clone() });
        }

        let core = self
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone();
        Ok(SummaryChild { core })
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let children = self.children.read().unwrap_or_else(PoisonError::into_inner);
        let metrics = children
            .iter()
            .map(|(values, core)| {
                core.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .to_proto(&DEFAULT_OBJECTIVES, label_pairs(&self.desc, values))
            })
            .collect();
        vec![family(&self.desc, metrics)]
    }
}
