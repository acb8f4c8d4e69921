use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::descriptor::{Algorithm, FileSizeClass, LogKind};

/// Top-level configuration for an lbsweep run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where experiment logs are read from and reports are written to.
    #[serde(default)]
    pub directories: DirectoriesConfig,

    /// The experiment design space that reports are expected to cover.
    #[serde(default)]
    pub design: DesignConfig,

    /// Number of worker nodes. Load-balancer queue snapshots must carry
    /// exactly this many entries. Default: 10.
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,

    /// Bucket count for client service-time distributions. Default: 50.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
}

/// Input and output directories.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoriesConfig {
    /// Client logs. Default: "tmp/output/user".
    #[serde(default = "default_user_dir")]
    pub user: PathBuf,

    /// Load-balancer logs. Default: "tmp/output/lb".
    #[serde(default = "default_lb_dir")]
    pub lb: PathBuf,

    /// Cluster node logs. Default: "tmp/output/cluster".
    #[serde(default = "default_cluster_dir")]
    pub cluster: PathBuf,

    /// Root directory for generated tables. Default: "tmp/output".
    #[serde(default = "default_output_dir")]
    pub output: PathBuf,
}

/// Experiment design dimensions.
#[derive(Debug, Clone, Deserialize)]
pub struct DesignConfig {
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,

    /// Injected network latencies in milliseconds. Default: [0, 25].
    #[serde(default = "default_latencies")]
    pub latencies_ms: Vec<u32>,

    #[serde(default = "default_homogeneity")]
    pub homogeneity: Vec<bool>,

    #[serde(default = "default_file_sizes")]
    pub file_sizes: Vec<FileSizeClass>,

    /// Request rates swept by every experiment. Default: [10, 50, 100, 150, 200].
    #[serde(default = "default_rates")]
    pub rates: Vec<u32>,

    /// Experiment duration in seconds. Default: 20.
    #[serde(default = "default_interval")]
    pub interval_s: u32,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cluster_size() -> usize {
    10
}

fn default_histogram_bins() -> usize {
    50
}

fn default_user_dir() -> PathBuf {
    PathBuf::from("tmp/output/user")
}

fn default_lb_dir() -> PathBuf {
    PathBuf::from("tmp/output/lb")
}

fn default_cluster_dir() -> PathBuf {
    PathBuf::from("tmp/output/cluster")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tmp/output")
}

fn default_algorithms() -> Vec<Algorithm> {
    Algorithm::all().to_vec()
}

fn default_latencies() -> Vec<u32> {
    vec![0, 25]
}

fn default_homogeneity() -> Vec<bool> {
    vec![true, false]
}

fn default_file_sizes() -> Vec<FileSizeClass> {
    FileSizeClass::all().to_vec()
}

fn default_rates() -> Vec<u32> {
    vec![10, 50, 100, 150, 200]
}

fn default_interval() -> u32 {
    20
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            directories: DirectoriesConfig::default(),
            design: DesignConfig::default(),
            cluster_size: default_cluster_size(),
            histogram_bins: default_histogram_bins(),
        }
    }
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            user: default_user_dir(),
            lb: default_lb_dir(),
            cluster: default_cluster_dir(),
            output: default_output_dir(),
        }
    }
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
            latencies_ms: default_latencies(),
            homogeneity: default_homogeneity(),
            file_sizes: default_file_sizes(),
            rates: default_rates(),
            interval_s: default_interval(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.cluster_size == 0 {
            bail!("cluster_size must be positive");
        }

        if self.histogram_bins == 0 {
            bail!("histogram_bins must be positive");
        }

        self.design.validate()
    }
}

impl DirectoriesConfig {
    /// Input directory for one log kind.
    pub fn for_kind(&self, kind: LogKind) -> &Path {
        match kind {
            LogKind::Client => &self.user,
            LogKind::LoadBalancer => &self.lb,
            LogKind::Cluster => &self.cluster,
        }
    }
}

impl DesignConfig {
    fn validate(&self) -> Result<()> {
        if self.rates.is_empty() {
            bail!("design.rates must contain at least one rate");
        }

        let mut seen = HashSet::with_capacity(self.rates.len());
        for &rate in &self.rates {
            if rate == 0 {
                bail!("design.rates must be positive");
            }
            if !seen.insert(rate) {
                bail!("design.rates contains duplicate rate: {rate}");
            }
        }

        if self.algorithms.is_empty() {
            bail!("design.algorithms must not be empty");
        }
        if self.latencies_ms.is_empty() {
            bail!("design.latencies_ms must not be empty");
        }
        if self.homogeneity.is_empty() {
            bail!("design.homogeneity must not be empty");
        }
        if self.file_sizes.is_empty() {
            bail!("design.file_sizes must not be empty");
        }
        if self.interval_s == 0 {
            bail!("design.interval_s must be positive");
        }

        Ok(())
    }

    /// Configured rates in ascending order.
    pub fn sorted_rates(&self) -> Vec<u32> {
        let mut rates = self.rates.clone();
        rates.sort_unstable();
        rates
    }
}
