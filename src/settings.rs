use std::fmt;
use std::str::FromStr;

use crate::error::{ResampleError, Result};
use crate::model::Connectivity;
use crate::resample::{
    FullZoneStatistics, InverseDistance, LocalWindowStatistics, NearestNeighbour,
    ResampleStrategy, ZoneStatistic,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMethod {
    #[default]
    NearestNeighbor,
    Idw,
    MinimumValue,
    MaximumValue,
    MeanValue,
    PercentileValue,
}

impl ResampleMethod {
    pub fn is_statistic(&self) -> bool {
        matches!(
            self,
            Self::MinimumValue | Self::MaximumValue | Self::MeanValue | Self::PercentileValue
        )
    }
}

impl FromStr for ResampleMethod {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nn" | "nearest" | "nearestneighbor" => Ok(Self::NearestNeighbor),
            "idw" => Ok(Self::Idw),
            "min" | "minimum" => Ok(Self::MinimumValue),
            "max" | "maximum" => Ok(Self::MaximumValue),
            "mean" | "average" => Ok(Self::MeanValue),
            "percentile" | "perc" => Ok(Self::PercentileValue),
            other => Err(ResampleError::invalid_settings(format!(
                "unknown resample method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NearestNeighbor => "nn",
            Self::Idw => "idw",
            Self::MinimumValue => "min",
            Self::MaximumValue => "max",
            Self::MeanValue => "mean",
            Self::PercentileValue => "percentile",
        };
        f.write_str(name)
    }
}

/// How a nearest neighbour cell combines several resolved neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictMethod {
    #[default]
    ArithmeticAverage,
    HarmonicAverage,
    MinimumValue,
    MaximumValue,
}

impl FromStr for ConflictMethod {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "avg" | "arithmetic" => Ok(Self::ArithmeticAverage),
            "harm" | "harmonic" => Ok(Self::HarmonicAverage),
            "min" | "minimum" => Ok(Self::MinimumValue),
            "max" | "maximum" => Ok(Self::MaximumValue),
            other => Err(ResampleError::invalid_settings(format!(
                "unknown conflict method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ConflictMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ArithmeticAverage => "avg",
            Self::HarmonicAverage => "harm",
            Self::MinimumValue => "min",
            Self::MaximumValue => "max",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdwParameters {
    pub power: f64,
    pub smoothing: f64,
    /// Sources farther away are ignored; `None` uses every source
    pub max_distance: Option<f64>,
}

impl Default for IdwParameters {
    fn default() -> Self {
        Self {
            power: 2.0,
            smoothing: 0.0,
            max_distance: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResampleSettings {
    pub method: ResampleMethod,
    pub conflict_method: ConflictMethod,
    pub idw: IdwParameters,
    pub percentile: Option<u8>,
    /// Half width of the statistics window, 0 for the whole zone
    pub stat_distance: usize,
    pub skip_diagonal: bool,
}

impl ResampleSettings {
    pub fn connectivity(&self) -> Connectivity {
        Connectivity::from_skip_diagonal(self.skip_diagonal)
    }

    pub fn validate(&self) -> Result<()> {
        match (self.method, self.percentile) {
            (ResampleMethod::PercentileValue, None) => {
                return Err(ResampleError::invalid_settings(
                    "percentile method requires a percentile value",
                ));
            }
            (ResampleMethod::PercentileValue, Some(p)) if p > 100 => {
                return Err(ResampleError::invalid_settings(format!(
                    "percentile must be within 0-100, got {}",
                    p
                )));
            }
            (ResampleMethod::PercentileValue, Some(_)) | (_, None) => {}
            (method, Some(_)) => {
                return Err(ResampleError::invalid_settings(format!(
                    "percentile is only valid for the percentile method, not '{}'",
                    method
                )));
            }
        }

        if self.stat_distance > 0 && !self.method.is_statistic() {
            return Err(ResampleError::invalid_settings(format!(
                "a statistics distance is only valid for statistics methods, not '{}'",
                self.method
            )));
        }

        if self.method == ResampleMethod::Idw {
            let idw = &self.idw;
            if !idw.power.is_finite() || idw.power <= 0.0 {
                return Err(ResampleError::invalid_settings(format!(
                    "IDW power must be positive, got {}",
                    idw.power
                )));
            }
            if !idw.smoothing.is_finite() || idw.smoothing < 0.0 {
                return Err(ResampleError::invalid_settings(format!(
                    "IDW smoothing must not be negative, got {}",
                    idw.smoothing
                )));
            }
            if let Some(distance) = idw.max_distance {
                if distance.is_nan() || distance <= 0.0 {
                    return Err(ResampleError::invalid_settings(format!(
                        "IDW maximum distance must be positive, got {}",
                        distance
                    )));
                }
            }
        }

        Ok(())
    }

    fn statistic(&self) -> Result<ZoneStatistic> {
        match self.method {
            ResampleMethod::MinimumValue => Ok(ZoneStatistic::Minimum),
            ResampleMethod::MaximumValue => Ok(ZoneStatistic::Maximum),
            ResampleMethod::MeanValue => Ok(ZoneStatistic::Mean),
            ResampleMethod::PercentileValue => self
                .percentile
                .map(ZoneStatistic::Percentile)
                .ok_or_else(|| {
                    ResampleError::invalid_settings("percentile method requires a percentile value")
                }),
            other => Err(ResampleError::invalid_settings(format!(
                "'{}' is not a statistics method",
                other
            ))),
        }
    }

    /// Validate and build the strategy for the configured method.
    pub fn strategy(&self) -> Result<Box<dyn ResampleStrategy>> {
        self.validate()?;

        let strategy: Box<dyn ResampleStrategy> = match self.method {
            ResampleMethod::NearestNeighbor => Box::new(NearestNeighbour::new(
                self.conflict_method,
                self.connectivity(),
            )),
            ResampleMethod::Idw => Box::new(InverseDistance::new(self.idw)),
            _ if self.stat_distance == 0 => Box::new(FullZoneStatistics::new(self.statistic()?)),
            _ => Box::new(LocalWindowStatistics::new(
                self.statistic()?,
                self.stat_distance,
            )),
        };
        Ok(strategy)
    }
}
