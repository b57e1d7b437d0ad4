//! Engine configuration, loadable from JSON.
//!
//! ```json
//! { "worker_count": 4, "integrator": { "kind": "adaptive", "min_depth": 3 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{WeightError, WeightResult};
use crate::integrate::{AdaptiveCubature, GaussLegendre, Integrator};

fn default_worker_count() -> usize {
    1
}

fn default_min_depth() -> usize {
    AdaptiveCubature::default().min_depth
}

fn default_max_depth() -> usize {
    AdaptiveCubature::default().max_depth
}

fn default_convergence_limit() -> f64 {
    AdaptiveCubature::default().convergence_limit
}

fn default_value_limit() -> f64 {
    AdaptiveCubature::default().value_limit
}

fn default_order() -> usize {
    8
}

fn default_subdivisions() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSettings {
    #[serde(default = "default_min_depth")]
    pub min_depth: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_convergence_limit")]
    pub convergence_limit: f64,
    #[serde(default = "default_value_limit")]
    pub value_limit: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            min_depth: default_min_depth(),
            max_depth: default_max_depth(),
            convergence_limit: default_convergence_limit(),
            value_limit: default_value_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussSettings {
    #[serde(default = "default_order")]
    pub order: usize,
    #[serde(default = "default_subdivisions")]
    pub subdivisions: usize,
}

impl Default for GaussSettings {
    fn default() -> Self {
        Self {
            order: default_order(),
            subdivisions: default_subdivisions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegratorConfig {
    Adaptive(AdaptiveSettings),
    GaussLegendre(GaussSettings),
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig::Adaptive(AdaptiveSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub integrator: IntegratorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            integrator: IntegratorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> WeightResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> WeightResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> WeightResult<()> {
        if self.worker_count == 0 {
            return Err(WeightError::Config("worker_count must be at least 1".into()));
        }
        match &self.integrator {
            IntegratorConfig::Adaptive(a) => {
                if a.min_depth > a.max_depth {
                    return Err(WeightError::Config(format!(
                        "min_depth {} exceeds max_depth {}",
                        a.min_depth, a.max_depth
                    )));
                }
                if a.convergence_limit.is_nan() || a.convergence_limit <= 0.0 {
                    return Err(WeightError::Config(
                        "convergence_limit must be positive".into(),
                    ));
                }
                if a.value_limit.is_nan() || a.value_limit < 0.0 {
                    return Err(WeightError::Config(
                        "value_limit must be non-negative".into(),
                    ));
                }
            }
            IntegratorConfig::GaussLegendre(g) => {
                if g.order == 0 || g.subdivisions == 0 {
                    return Err(WeightError::Config(
                        "gauss_legendre order and subdivisions must be at least 1".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn build_integrator(&self) -> Box<dyn Integrator> {
        match &self.integrator {
            IntegratorConfig::Adaptive(a) => Box::new(AdaptiveCubature {
                min_depth: a.min_depth,
                max_depth: a.max_depth,
                convergence_limit: a.convergence_limit,
                value_limit: a.value_limit,
            }),
            IntegratorConfig::GaussLegendre(g) => {
                Box::new(GaussLegendre::new(g.order, g.subdivisions))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_integrator_settings() {
        let config = EngineConfig::from_json_str(
            r#"{"worker_count": 4, "integrator": {"kind": "gauss_legendre", "order": 12}}"#,
        )
        .unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(
            config.integrator,
            IntegratorConfig::GaussLegendre(GaussSettings {
                order: 12,
                subdivisions: 1
            })
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"worker_count": 0}"#),
            Err(WeightError::Config(_))
        ));
        assert!(EngineConfig::from_json_str(
            r#"{"integrator": {"kind": "adaptive", "min_depth": 9, "max_depth": 3}}"#
        )
        .is_err());
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"worker_count": "many"}"#),
            Err(WeightError::Json(_))
        ));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = EngineConfig {
            worker_count: 3,
            integrator: IntegratorConfig::Adaptive(AdaptiveSettings {
                min_depth: 1,
                ..AdaptiveSettings::default()
            }),
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }
}
