use rand::Rng;

/// Decides whether a request is struck by a simulated server failure.
/// Injectable so tests can force either outcome instead of sampling.
pub trait FaultPolicy: Send + Sync {
    fn should_fail(&self, error_rate: f64) -> bool;
}

/// Production policy: one roll per request against the configured rate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomFaults;

impl FaultPolicy for RandomFaults {
    fn should_fail(&self, error_rate: f64) -> bool {
        error_rate > 0.0 && rand::rng().random::<f64>() < error_rate
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultPolicy for NoFaults {
    fn should_fail(&self, _error_rate: f64) -> bool {
        false
    }
}

/// Every request fails. Only useful in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFail;

impl FaultPolicy for AlwaysFail {
    fn should_fail(&self, _error_rate: f64) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_policy_honors_boundary_rates() {
        let policy = RandomFaults;
        assert!(!policy.should_fail(0.0));
        assert!(policy.should_fail(1.0));
    }

    #[test]
    fn fixed_policies_ignore_the_rate() {
        assert!(!NoFaults.should_fail(1.0));
        assert!(AlwaysFail.should_fail(0.0));
    }
}
