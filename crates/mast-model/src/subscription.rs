//! Variable subscriptions and notification filters.
//!
//! A subscription attaches a subscriber identity and a filter to one
//! variable. On every accepted write the variable evaluates its
//! subscriptions in the order they were added; the matching ones become
//! notifications for the embedder to deliver. Filter state (last reported
//! value, inside/outside a range) lives on the subscription record and is
//! seeded from the variable's value at subscription time.

use crate::ModelError;
use mast_types::{DataType, NodeId, SubscriptionId, Value};
use serde::{Deserialize, Serialize};

/// How a range filter reacts to boundary transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeMode {
    /// Fire when the value enters `[low, high]`.
    OnEnter,
    /// Fire when the value leaves `[low, high]`.
    OnExit,
    /// Fire on every crossing, either direction.
    OnBoth,
}

/// Filter deciding which accepted writes notify a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubscriptionFilter {
    /// Notify on every accepted write.
    All,

    /// Notify when the value moved far enough from the last reported one.
    ///
    /// With `is_percent` the distance is measured as a percentage of the
    /// last reported value (absolute when that value is zero). For
    /// non-numeric variables only `deadband == 0` is valid, and the
    /// filter then behaves exactly like [`All`](Self::All).
    DataChange {
        /// Minimum change that triggers a notification (strictly
        /// exceeded).
        deadband: f64,
        /// Measure the change as a percentage of the last reported value.
        is_percent: bool,
    },

    /// Notify when the value crosses the `[low, high]` boundary.
    ///
    /// Updates that stay on the same side of the boundary never fire.
    Range {
        /// Inclusive lower bound.
        low: f64,
        /// Inclusive upper bound.
        high: f64,
        /// Which crossings fire.
        mode: RangeMode,
    },
}

impl SubscriptionFilter {
    /// Shorthand for an absolute deadband filter.
    #[must_use]
    pub fn deadband(deadband: f64) -> Self {
        Self::DataChange {
            deadband,
            is_percent: false,
        }
    }

    /// Validates the filter parameters against the variable's type.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_FILTER` when the deadband is negative, the range
    /// bounds are inverted or non-finite, or a numeric-only filter is
    /// attached to a non-numeric variable.
    pub fn validate(&self, variable_type: DataType) -> Result<(), ModelError> {
        match self {
            Self::All => Ok(()),
            Self::DataChange { deadband, .. } => {
                if *deadband < 0.0 || !deadband.is_finite() {
                    return Err(ModelError::InvalidFilter(format!(
                        "deadband must be finite and >= 0, got {deadband}"
                    )));
                }
                if *deadband > 0.0 && variable_type != DataType::Num {
                    return Err(ModelError::InvalidFilter(format!(
                        "non-zero deadband requires a numeric variable, got {variable_type}"
                    )));
                }
                Ok(())
            }
            Self::Range { low, high, .. } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(ModelError::InvalidFilter(
                        "range bounds must be finite".into(),
                    ));
                }
                if low > high {
                    return Err(ModelError::InvalidFilter(format!(
                        "range low {low} exceeds high {high}"
                    )));
                }
                if variable_type != DataType::Num {
                    return Err(ModelError::InvalidFilter(format!(
                        "range filter requires a numeric variable, got {variable_type}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Mutable filter state carried by a subscription record.
#[derive(Debug, Clone, PartialEq)]
enum FilterState {
    /// No state needed.
    None,
    /// Last value reported to the subscriber.
    Deadband { last_reported: f64 },
    /// Whether the value currently sits inside the range.
    Range { inside: bool },
}

/// One subscription attached to a variable.
///
/// Records never own the subscriber; they hold only its identity, the
/// filter, and the filter's state.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    id: SubscriptionId,
    subscriber: String,
    filter: SubscriptionFilter,
    state: FilterState,
}

impl Subscription {
    /// Creates a subscription, seeding filter state from the variable's
    /// current value.
    ///
    /// # Errors
    ///
    /// Propagates filter validation errors.
    pub fn new(
        subscriber: impl Into<String>,
        filter: SubscriptionFilter,
        current: &Value,
    ) -> Result<Self, ModelError> {
        filter.validate(current.data_type())?;
        let state = match &filter {
            SubscriptionFilter::All => FilterState::None,
            SubscriptionFilter::DataChange { .. } => match current.as_num() {
                Some(n) => FilterState::Deadband { last_reported: n },
                None => FilterState::None,
            },
            SubscriptionFilter::Range { low, high, .. } => {
                let n = current.expect_num().map_err(|_| {
                    ModelError::InvalidFilter("range filter requires a numeric variable".into())
                })?;
                FilterState::Range {
                    inside: *low <= n && n <= *high,
                }
            }
        };
        Ok(Self {
            id: SubscriptionId::new(),
            subscriber: subscriber.into(),
            filter,
            state,
        })
    }

    /// The subscription handle.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscriber identity.
    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    /// The filter this subscription was created with.
    #[must_use]
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Evaluates the filter against a freshly written value, updating
    /// filter state. Returns `true` when the subscriber must be notified.
    pub fn should_notify(&mut self, new: &Value) -> bool {
        match (&self.filter, &mut self.state) {
            (SubscriptionFilter::All, _) => true,
            (SubscriptionFilter::DataChange { deadband, is_percent }, state) => {
                let Some(n) = new.as_num() else {
                    // non-numeric data change collapses to All
                    return true;
                };
                let FilterState::Deadband { last_reported } = state else {
                    *state = FilterState::Deadband { last_reported: n };
                    return true;
                };
                let change = if *is_percent && *last_reported != 0.0 {
                    ((n - *last_reported) / *last_reported).abs() * 100.0
                } else {
                    (n - *last_reported).abs()
                };
                if change > *deadband {
                    *last_reported = n;
                    true
                } else {
                    false
                }
            }
            (SubscriptionFilter::Range { low, high, mode }, FilterState::Range { inside }) => {
                let Some(n) = new.as_num() else {
                    return false;
                };
                let now_inside = *low <= n && n <= *high;
                let crossed = now_inside != *inside;
                let was_inside = *inside;
                *inside = now_inside;
                match mode {
                    RangeMode::OnEnter => crossed && now_inside,
                    RangeMode::OnExit => crossed && was_inside,
                    RangeMode::OnBoth => crossed,
                }
            }
            (SubscriptionFilter::Range { .. }, _) => false,
        }
    }
}

/// A notification produced by an accepted write, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The matched subscription.
    pub subscription: SubscriptionId,
    /// Identity of the subscriber to deliver to.
    pub subscriber: String,
    /// The variable the subscription is attached to.
    pub node: NodeId,
    /// Path of that variable, for the wire reference.
    pub path: String,
    /// The value the subscriber sees (composite for object variables).
    pub value: Value,
}

/// The observable result of one accepted write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// The written variable.
    pub node: NodeId,
    /// Monotonic write sequence number; waits armed at an earlier tick
    /// are eligible to wake on this write.
    pub tick: u64,
    /// Matched notifications, direct subscribers first, then ancestor
    /// object variables bottom-up.
    pub notifications: Vec<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_filter_always_fires() {
        let mut sub =
            Subscription::new("s", SubscriptionFilter::All, &Value::from(0.0)).expect("valid");
        assert!(sub.should_notify(&Value::from(1.0)));
        assert!(sub.should_notify(&Value::from(1.0)));
    }

    #[test]
    fn deadband_requires_strict_excess() {
        let mut sub = Subscription::new(
            "s",
            SubscriptionFilter::deadband(2.0),
            &Value::from(5.0),
        )
        .expect("valid");
        // 5 -> 6: |1| <= 2, quiet
        assert!(!sub.should_notify(&Value::from(6.0)));
        // last reported is still 5; 6 -> 5 is also quiet
        assert!(!sub.should_notify(&Value::from(5.0)));
        // 5 -> 8 exceeds the deadband
        assert!(sub.should_notify(&Value::from(8.0)));
        // new baseline is 8
        assert!(!sub.should_notify(&Value::from(7.0)));
    }

    #[test]
    fn deadband_exact_distance_is_quiet() {
        let mut sub = Subscription::new(
            "s",
            SubscriptionFilter::deadband(2.0),
            &Value::from(0.0),
        )
        .expect("valid");
        assert!(!sub.should_notify(&Value::from(2.0)));
        assert!(sub.should_notify(&Value::from(2.1)));
    }

    #[test]
    fn percent_deadband() {
        let mut sub = Subscription::new(
            "s",
            SubscriptionFilter::DataChange {
                deadband: 10.0,
                is_percent: true,
            },
            &Value::from(100.0),
        )
        .expect("valid");
        assert!(!sub.should_notify(&Value::from(105.0)));
        assert!(sub.should_notify(&Value::from(111.0)));
    }

    #[test]
    fn zero_deadband_on_string_collapses_to_all() {
        let mut sub = Subscription::new(
            "s",
            SubscriptionFilter::deadband(0.0),
            &Value::from("idle"),
        )
        .expect("valid");
        assert!(sub.should_notify(&Value::from("idle")));
        assert!(sub.should_notify(&Value::from("run")));
    }

    #[test]
    fn nonzero_deadband_on_string_is_invalid() {
        let err = Subscription::new("s", SubscriptionFilter::deadband(1.0), &Value::from("x"))
            .expect_err("strings have no distance");
        assert!(matches!(err, ModelError::InvalidFilter(_)));
    }

    #[test]
    fn negative_deadband_is_invalid() {
        let err = Subscription::new("s", SubscriptionFilter::deadband(-1.0), &Value::from(0.0))
            .expect_err("negative deadband");
        assert!(matches!(err, ModelError::InvalidFilter(_)));
    }

    #[test]
    fn range_on_enter() {
        let filter = SubscriptionFilter::Range {
            low: 10.0,
            high: 20.0,
            mode: RangeMode::OnEnter,
        };
        let mut sub = Subscription::new("s", filter, &Value::from(0.0)).expect("valid");
        // interior-to-interior outside: quiet
        assert!(!sub.should_notify(&Value::from(5.0)));
        // crossing in fires
        assert!(sub.should_notify(&Value::from(15.0)));
        // staying inside is quiet
        assert!(!sub.should_notify(&Value::from(16.0)));
        // leaving is quiet for OnEnter
        assert!(!sub.should_notify(&Value::from(25.0)));
        // re-entering fires again
        assert!(sub.should_notify(&Value::from(10.0)));
    }

    #[test]
    fn range_on_exit_and_both() {
        let mut exit = Subscription::new(
            "s",
            SubscriptionFilter::Range {
                low: 0.0,
                high: 1.0,
                mode: RangeMode::OnExit,
            },
            &Value::from(0.5),
        )
        .expect("valid");
        assert!(!exit.should_notify(&Value::from(0.9)));
        assert!(exit.should_notify(&Value::from(2.0)));

        let mut both = Subscription::new(
            "s",
            SubscriptionFilter::Range {
                low: 0.0,
                high: 1.0,
                mode: RangeMode::OnBoth,
            },
            &Value::from(0.5),
        )
        .expect("valid");
        assert!(both.should_notify(&Value::from(2.0)));
        assert!(both.should_notify(&Value::from(0.0)));
    }

    #[test]
    fn inverted_range_is_invalid() {
        let filter = SubscriptionFilter::Range {
            low: 5.0,
            high: 1.0,
            mode: RangeMode::OnBoth,
        };
        assert!(matches!(
            filter.validate(DataType::Num),
            Err(ModelError::InvalidFilter(_))
        ));
    }

    #[test]
    fn range_on_non_numeric_is_invalid() {
        let filter = SubscriptionFilter::Range {
            low: 0.0,
            high: 1.0,
            mode: RangeMode::OnBoth,
        };
        assert!(matches!(
            filter.validate(DataType::Bool),
            Err(ModelError::InvalidFilter(_))
        ));
    }

    #[test]
    fn subscription_ids_are_unique() {
        let a = Subscription::new("s", SubscriptionFilter::All, &Value::from(0.0)).expect("a");
        let b = Subscription::new("s", SubscriptionFilter::All, &Value::from(0.0)).expect("b");
        assert_ne!(a.id(), b.id());
    }
}
