//! Indicator output interface

use crate::core::{IndicatorRole, IndicatorVector};
use tracing::info;

/// Four independently settable boolean outputs.
///
/// `set` must be idempotent: writing the current value has no effect.
pub trait IndicatorOutputs: Send + 'static {
    fn set(&mut self, role: IndicatorRole, on: bool);

    /// Drive every output to match `vector`
    fn apply(&mut self, vector: &IndicatorVector) {
        for role in IndicatorRole::ALL {
            self.set(role, vector.get(role));
        }
    }

    /// Switch every output off
    fn all_off(&mut self) {
        self.apply(&IndicatorVector::default());
    }
}

/// Indicator bank that reports changes through the log instead of pins
#[derive(Debug, Default)]
pub struct LoggingIndicators {
    current: IndicatorVector,
}

impl LoggingIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> IndicatorVector {
        self.current
    }
}

impl IndicatorOutputs for LoggingIndicators {
    fn set(&mut self, role: IndicatorRole, on: bool) {
        let slot = match role {
            IndicatorRole::Neck => &mut self.current.neck,
            IndicatorRole::Shoulder => &mut self.current.shoulder,
            IndicatorRole::WeightLeft => &mut self.current.weight_left,
            IndicatorRole::WeightRight => &mut self.current.weight_right,
        };
        if *slot != on {
            *slot = on;
            info!(?role, on, "indicator changed");
        }
    }
}
