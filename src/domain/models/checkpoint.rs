//! Controller checkpoints: opaque parameter vectors that can be perturbed and blended.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::region::RegionId;
use crate::domain::errors::{RepairError, RepairResult};

/// Shape descriptor carried alongside the parameters.
///
/// The repair algorithm never interprets it; it is passed through to the
/// plant simulator and used to reject blends across incompatible networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Layer widths, input first
    pub layers: Vec<usize>,
    /// Hidden-layer activation name (e.g. "tanh")
    pub activation: String,
}

impl Architecture {
    /// Number of weights plus biases for a dense feed-forward stack.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .windows(2)
            .map(|pair| pair[0] * pair[1] + pair[1])
            .sum()
    }
}

/// A controller parameter vector plus the version tag used for output naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerCheckpoint {
    /// Iteration at which this checkpoint was produced (0 = initial controller)
    pub version: u64,
    pub architecture: Architecture,
    pub params: Vec<f64>,
}

impl ControllerCheckpoint {
    /// Create a checkpoint, checking that the parameter count matches the architecture.
    pub fn new(architecture: Architecture, params: Vec<f64>) -> RepairResult<Self> {
        let expected = architecture.parameter_count();
        if expected != params.len() {
            return Err(RepairError::ArchitectureMismatch {
                expected,
                found: params.len(),
            });
        }
        Ok(Self {
            version: 0,
            architecture,
            params,
        })
    }

    /// Create a checkpoint from a bare parameter vector with a flat single-layer shape.
    ///
    /// Used where the architecture is irrelevant (tests, synthetic plants).
    pub fn from_params(params: Vec<f64>) -> Self {
        Self {
            version: 0,
            architecture: Architecture {
                layers: Vec::new(),
                activation: "none".to_string(),
            },
            params,
        }
    }

    /// Return a copy tagged with the given version.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the checkpoint holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Start a transactional edit of the parameters.
    ///
    /// The parameters are restored to their current values when the returned
    /// guard is dropped without [`ParameterTransaction::commit`].
    pub fn begin(&mut self) -> ParameterTransaction<'_> {
        let snapshot = self.params.clone();
        ParameterTransaction {
            target: self,
            snapshot,
            committed: false,
        }
    }

    fn check_compatible(&self, other: &Self) -> RepairResult<()> {
        if self.architecture != other.architecture || self.params.len() != other.params.len() {
            return Err(RepairError::ArchitectureMismatch {
                expected: self.params.len(),
                found: other.params.len(),
            });
        }
        Ok(())
    }
}

/// Names an accepted checkpoint by the loop iteration and region that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointTag {
    pub iteration: u64,
    pub region: RegionId,
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iter_{}_region_{}", self.iteration, self.region)
    }
}

/// Coordinate-wise convex combination `w * a + (1 - w) * b`.
///
/// `w = 1` reproduces `a` and `w = 0` reproduces `b` exactly. The result
/// inherits the version of `b`.
pub fn blend(
    a: &ControllerCheckpoint,
    b: &ControllerCheckpoint,
    w: f64,
) -> RepairResult<ControllerCheckpoint> {
    if !(0.0..=1.0).contains(&w) {
        return Err(RepairError::InvalidWeight(w));
    }
    a.check_compatible(b)?;

    if w == 1.0 {
        return Ok(ControllerCheckpoint {
            version: b.version,
            ..a.clone()
        });
    }
    if w == 0.0 {
        return Ok(b.clone());
    }

    let params = a
        .params
        .iter()
        .zip(&b.params)
        .map(|(pa, pb)| pa * w + pb * (1.0 - w))
        .collect();

    Ok(ControllerCheckpoint {
        version: b.version,
        architecture: b.architecture.clone(),
        params,
    })
}

/// Snapshot/restore guard over a checkpoint's parameters.
pub struct ParameterTransaction<'a> {
    target: &'a mut ControllerCheckpoint,
    snapshot: Vec<f64>,
    committed: bool,
}

impl ParameterTransaction<'_> {
    /// Mutable view of the parameters being edited.
    pub fn params_mut(&mut self) -> &mut [f64] {
        &mut self.target.params
    }

    /// The checkpoint with the pending edits applied.
    pub fn controller(&self) -> &ControllerCheckpoint {
        self.target
    }

    /// Keep the pending edits.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ParameterTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.target.params.copy_from_slice(&self.snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tanh_2x2() -> Architecture {
        Architecture {
            layers: vec![2, 2, 1],
            activation: "tanh".to_string(),
        }
    }

    #[test]
    fn test_tag_display() {
        let tag = CheckpointTag {
            iteration: 4,
            region: RegionId(17),
        };
        assert_eq!(tag.to_string(), "iter_4_region_17");
    }

    #[test]
    fn test_parameter_count() {
        // 2*2+2 + 2*1+1
        assert_eq!(tanh_2x2().parameter_count(), 9);
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let result = ControllerCheckpoint::new(tanh_2x2(), vec![0.0; 8]);
        assert!(matches!(
            result,
            Err(RepairError::ArchitectureMismatch {
                expected: 9,
                found: 8
            })
        ));
    }

    #[test]
    fn test_blend_endpoints_exact() {
        let a = ControllerCheckpoint::from_params(vec![1.0, -2.0, 0.3]);
        let b = ControllerCheckpoint::from_params(vec![4.0, 5.0, -0.7]);

        assert_eq!(blend(&a, &b, 1.0).unwrap().params, a.params);
        assert_eq!(blend(&a, &b, 0.0).unwrap().params, b.params);

        let mid = blend(&a, &b, 0.5).unwrap();
        for (got, want) in mid.params.iter().zip([2.5, 1.5, -0.2]) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn test_blend_rejects_out_of_range_weight() {
        let a = ControllerCheckpoint::from_params(vec![1.0]);
        assert!(matches!(
            blend(&a, &a, 1.5),
            Err(RepairError::InvalidWeight(_))
        ));
        assert!(matches!(
            blend(&a, &a, -0.1),
            Err(RepairError::InvalidWeight(_))
        ));
    }

    #[test]
    fn test_blend_rejects_mismatched_shapes() {
        let a = ControllerCheckpoint::from_params(vec![1.0, 2.0]);
        let b = ControllerCheckpoint::from_params(vec![1.0]);
        assert!(blend(&a, &b, 0.5).is_err());
    }

    #[test]
    fn test_transaction_rolls_back_on_drop() {
        let mut checkpoint = ControllerCheckpoint::from_params(vec![0.1, 0.2, 0.3]);
        let before: Vec<u64> = checkpoint.params.iter().map(|p| p.to_bits()).collect();
        {
            let mut tx = checkpoint.begin();
            for p in tx.params_mut() {
                *p += 1.0e-9;
            }
            assert!((tx.controller().params[0] - 0.1).abs() > 0.0);
        }
        let after: Vec<u64> = checkpoint.params.iter().map(|p| p.to_bits()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_transaction_commit_keeps_edits() {
        let mut checkpoint = ControllerCheckpoint::from_params(vec![1.0]);
        let mut tx = checkpoint.begin();
        tx.params_mut()[0] = 2.0;
        tx.commit();
        assert_eq!(checkpoint.params, vec![2.0]);
    }
}
