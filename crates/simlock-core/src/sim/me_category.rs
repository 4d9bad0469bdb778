use serde::{Deserialize, Serialize};

/// Network personalization lock category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeCategory {
    Network,
    NetworkSubset,
    ServiceProvider,
    Corporate,
    Sim,
}

impl MeCategory {
    /// Short label shown next to the ME entry prompt.
    pub fn label(&self) -> &'static str {
        match self {
            MeCategory::Network => "[NP]",
            MeCategory::NetworkSubset => "[NSP]",
            MeCategory::ServiceProvider => "[SP]",
            MeCategory::Corporate => "[CP]",
            MeCategory::Sim => "[SIMP]",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_distinct() {
        let labels = [
            MeCategory::Network.label(),
            MeCategory::NetworkSubset.label(),
            MeCategory::ServiceProvider.label(),
            MeCategory::Corporate.label(),
            MeCategory::Sim.label(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in labels.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
