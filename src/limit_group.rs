use crate::{Limiter, RateLimitKey, TallyguardError};

/// Result of [`LimitGroup::increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDecision {
    /// Whether every member admitted the action.
    pub allowed: bool,
    /// Index of the first member that denied, if any.
    pub denied_by: Option<usize>,
}

/// Several limiters applied as one all-or-nothing admission.
///
/// Members are incremented in order. When one denies, the increments already
/// admitted by earlier members are rolled back with a decrement of the exact
/// window each of them charged, even if the clock has since moved on, so a denied
/// group action does not consume their quota. The denying member keeps its
/// recorded attempt, like any other denied increment.
///
/// Rollback is not atomic across members: a concurrent caller may briefly see
/// the rolled-back slots as used.
#[derive(Clone, Debug, Default)]
pub struct LimitGroup {
    limiters: Vec<Limiter>,
}

impl LimitGroup {
    /// Group `limiters`, evaluated in the given order.
    pub fn new(limiters: Vec<Limiter>) -> Self {
        Self { limiters }
    }

    /// Append a member.
    pub fn push(&mut self, limiter: Limiter) {
        self.limiters.push(limiter);
    }

    /// Members in evaluation order.
    pub fn limiters(&self) -> &[Limiter] {
        &self.limiters
    }

    /// Increment every member, or none of them.
    ///
    /// On a store error the admitted members are rolled back (best effort) and
    /// the original error is returned.
    pub async fn increment(&self) -> Result<GroupDecision, TallyguardError> {
        let mut charged = Vec::with_capacity(self.limiters.len());

        for (index, limiter) in self.limiters.iter().enumerate() {
            match limiter.increment_keyed(1).await {
                Ok((decision, key)) if decision.allowed => charged.push(key),
                Ok(_) => {
                    self.rollback(&charged).await;

                    return Ok(GroupDecision {
                        allowed: false,
                        denied_by: Some(index),
                    });
                }
                Err(err) => {
                    self.rollback(&charged).await;
                    return Err(err);
                }
            }
        }

        Ok(GroupDecision {
            allowed: true,
            denied_by: None,
        })
    } // end method increment

    /// Current window count of each member.
    pub async fn count(&self) -> Result<Vec<u64>, TallyguardError> {
        let mut counts = Vec::with_capacity(self.limiters.len());

        for limiter in &self.limiters {
            counts.push(limiter.count().await?);
        }

        Ok(counts)
    }

    /// Reset every member.
    pub async fn reset(&self) -> Result<(), TallyguardError> {
        for limiter in &self.limiters {
            limiter.reset().await?;
        }

        Ok(())
    }

    /// Give back one action to each admitted member, in the window it was charged.
    async fn rollback(&self, charged: &[RateLimitKey]) {
        for (limiter, key) in self.limiters.iter().zip(charged) {
            if let Err(err) = limiter.decrement_key(key, 1).await {
                tracing::warn!(
                    key = %key,
                    error = %err,
                    "failed to roll back group increment"
                );
            }
        }
    } // end method rollback
}
