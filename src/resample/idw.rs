use std::collections::HashMap;

use tracing::debug;

use super::{check_shapes, in_scope, zone_key, ResampleScope, ResampleStrategy};
use crate::error::Result;
use crate::model::Grid;
use crate::settings::IdwParameters;

/// Known value at a cell centre.
#[derive(Debug, Clone, Copy)]
struct Source {
    x: f64,
    y: f64,
    value: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct InverseDistance {
    params: IdwParameters,
}

impl InverseDistance {
    pub fn new(params: IdwParameters) -> Self {
        Self { params }
    }
}

impl ResampleStrategy for InverseDistance {
    fn name(&self) -> &'static str {
        "inverse distance weighting"
    }

    fn scope(&self) -> ResampleScope {
        ResampleScope::Region
    }

    fn resample(&self, values: &Grid, zone: &Grid, zone_value: Option<f32>) -> Result<Grid> {
        check_shapes(values, zone)?;

        let mut result = values.reset();
        let mut sources: HashMap<u32, Vec<Source>> = HashMap::new();
        let mut targets = Vec::new();
        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if !in_scope(zone, row, col, zone_value) {
                    continue;
                }
                let key = zone_key(zone.get(row, col));
                if values.has_data(row, col) {
                    let value = values.get(row, col);
                    result.set(row, col, value);
                    let (x, y) = values.cell_center(row, col);
                    sources.entry(key).or_default().push(Source { x, y, value });
                } else {
                    targets.push((row, col, key));
                }
            }
        }

        let mut unresolved = 0;
        for (row, col, key) in targets {
            let zone_sources = sources.get(&key).map(Vec::as_slice).unwrap_or_default();
            let target = values.cell_center(row, col);
            match weighted_value(target, zone_sources, &self.params) {
                Some(value) => result.set(row, col, value),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            debug!("{} cells have no IDW source within range", unresolved);
        }

        Ok(result)
    }
}

fn weighted_value(target: (f64, f64), sources: &[Source], params: &IdwParameters) -> Option<f32> {
    let max_distance_sq = params.max_distance.map(|d| d * d);
    let mut weighted_sum = 0.0f64;
    let mut weight_sum = 0.0f64;

    for source in sources {
        let dx = source.x - target.0;
        let dy = source.y - target.1;
        let distance_sq = dx * dx + dy * dy;
        if max_distance_sq.is_some_and(|max| distance_sq > max) {
            continue;
        }
        if distance_sq == 0.0 {
            return Some(source.value);
        }
        let weight = 1.0 / (distance_sq.sqrt().powf(params.power) + params.smoothing);
        weighted_sum += weight * source.value as f64;
        weight_sum += weight;
    }

    (weight_sum > 0.0).then(|| (weighted_sum / weight_sum) as f32)
}

/// IDW estimate at a point from `(x, y, value)` samples.
pub fn idw_value(
    x: f64,
    y: f64,
    samples: &[(f64, f64, f32)],
    params: &IdwParameters,
) -> Option<f32> {
    let sources: Vec<Source> = samples
        .iter()
        .map(|&(x, y, value)| Source { x, y, value })
        .collect();
    weighted_value((x, y), &sources, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f32 = -9999.0;

    #[test]
    fn test_zero_distance_returns_source_value() {
        let samples = [(5.0, 5.0, 12.5f32), (15.0, 5.0, 30.0)];
        for power in [0.5, 1.0, 2.0, 3.0] {
            for smoothing in [0.0, 0.1, 10.0] {
                let params = IdwParameters {
                    power,
                    smoothing,
                    max_distance: None,
                };
                assert_eq!(idw_value(5.0, 5.0, &samples, &params), Some(12.5));
            }
        }
    }

    #[test]
    fn test_equidistant_sources_average() {
        let samples = [(0.0, 0.0, 10.0f32), (20.0, 0.0, 30.0)];
        let value = idw_value(10.0, 0.0, &samples, &IdwParameters::default());
        assert_eq!(value, Some(20.0));
    }

    #[test]
    fn test_weights_follow_power() {
        // 距離 1 と 3、power=2 の重みは 1 と 1/9
        let samples = [(1.0, 0.0, 10.0f32), (-3.0, 0.0, 0.0)];
        let value = idw_value(0.0, 0.0, &samples, &IdwParameters::default()).unwrap();
        assert!((value - 9.0).abs() < 1e-5, "got {}", value);
    }

    #[test]
    fn test_smoothing_flattens_weights() {
        // power=2, smoothing=1 の重みは 1/(1+1) と 1/(9+1)
        let samples = [(1.0, 0.0, 10.0f32), (-3.0, 0.0, 0.0)];
        let params = IdwParameters {
            smoothing: 1.0,
            ..Default::default()
        };
        let value = idw_value(0.0, 0.0, &samples, &params).unwrap();
        let expected = (0.5 * 10.0) / (0.5 + 0.1);
        assert!((value as f64 - expected).abs() < 1e-5, "got {}", value);

        // 平滑化なしより遠いソースの影響が大きい
        let unsmoothed = idw_value(0.0, 0.0, &samples, &IdwParameters::default()).unwrap();
        assert!(value < unsmoothed);
    }

    #[test]
    fn test_max_distance_excludes_sources() {
        let samples = [(1.0, 0.0, 10.0f32), (-3.0, 0.0, 0.0)];
        let params = IdwParameters {
            max_distance: Some(2.0),
            ..Default::default()
        };
        assert_eq!(idw_value(0.0, 0.0, &samples, &params), Some(10.0));

        let params = IdwParameters {
            max_distance: Some(0.5),
            ..Default::default()
        };
        assert_eq!(idw_value(0.0, 0.0, &samples, &params), None);
    }

    #[test]
    fn test_fills_zone_targets_only() {
        let zone = Grid::from_rows(0.0, 0.0, 10.0, ND, &[&[1.0, 1.0, 1.0, 2.0]]).unwrap();
        let values = Grid::from_rows(0.0, 0.0, 10.0, ND, &[&[10.0, ND, 30.0, ND]]).unwrap();

        let result = InverseDistance::new(IdwParameters::default())
            .resample(&values, &zone, Some(1.0))
            .unwrap();
        assert_eq!(result.values, vec![10.0, 20.0, 30.0, ND]);
    }
}
