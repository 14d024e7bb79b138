use std::fmt;

/// Fraud probability bands used for transaction badges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// Above 0.7 is high, above 0.3 is medium. A missing probability is low.
    pub fn classify(fraud_probability: Option<f64>) -> Self {
        match fraud_probability {
            Some(p) if p > 0.7 => Self::High,
            Some(p) if p > 0.3 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries_are_exclusive() {
        assert_eq!(RiskBand::classify(Some(0.71)), RiskBand::High);
        assert_eq!(RiskBand::classify(Some(0.7)), RiskBand::Medium);
        assert_eq!(RiskBand::classify(Some(0.31)), RiskBand::Medium);
        assert_eq!(RiskBand::classify(Some(0.3)), RiskBand::Low);
        assert_eq!(RiskBand::classify(None), RiskBand::Low);
    }
}
