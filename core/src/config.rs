use crate::{
    error::WsmsResult,
    tariff::{validate_tiers, RateTableProvider, TariffTier},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Tariff ─────────────────────────────────────────────────────────

/// The default tariff schedule shipped with the deployment.
///
/// Seeds an empty `tariff_rates` table and prices quotes when no
/// store is involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    pub tariff_id: String,
    pub label:     String,
    pub tiers:     Vec<TariffTier>,
}

impl RateTableProvider for TariffConfig {
    fn fetch_tiers(&self) -> WsmsResult<Vec<TariffTier>> {
        validate_tiers(self.tiers.clone())
    }
}

// ── Settings ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub currency:              String,
    /// How long a writer waits on the database lock before failing.
    pub busy_timeout_ms:       u64,
    /// Length of the dashboard's recent readings / bills lists.
    pub recent_activity_limit: usize,
    /// Customers created by the demo seeder.
    pub demo_customers:        usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency:              "USD".into(),
            busy_timeout_ms:       5_000,
            recent_activity_limit: 5,
            demo_customers:        5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tariff:   TariffConfig,
    pub settings: Settings,
}

impl AppConfig {
    /// Load from the data/ directory.
    /// In tests, use AppConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let tariff_path = format!("{data_dir}/tariff/tariff_rates.json");
        let tariff_content = std::fs::read_to_string(&tariff_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tariff_path}: {e}"))?;
        let tariff: TariffConfig = serde_json::from_str(&tariff_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {tariff_path}: {e}"))?;

        // Fail at startup rather than on the first reading.
        validate_tiers(tariff.tiers.clone())
            .map_err(|e| anyhow::anyhow!("{tariff_path}: {e}"))?;

        let settings_path = format!("{data_dir}/settings.json");
        let settings = match std::fs::read_to_string(&settings_path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Cannot parse {settings_path}: {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("{settings_path} not found, using default settings");
                Settings::default()
            }
            Err(e) => return Err(anyhow::anyhow!("Cannot read {settings_path}: {e}")),
        };

        log::info!(
            "config: tariff '{}' with {} tiers loaded from {data_dir}",
            tariff.tariff_id,
            tariff.tiers.len()
        );

        Ok(Self { tariff, settings })
    }

    /// Config with hardcoded defaults for use in tests.
    ///
    /// Tariff: 0-10 units at 1.00, everything above at 2.00.
    pub fn default_test() -> Self {
        Self {
            tariff: TariffConfig {
                tariff_id: "test-two-tier".into(),
                label:     "Test two-tier".into(),
                tiers: vec![
                    TariffTier::bounded(0, 10, Decimal::new(100, 2)),
                    TariffTier::unbounded(10, Decimal::new(200, 2)),
                ],
            },
            settings: Settings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_tariff_is_valid() {
        let config = AppConfig::default_test();
        let tiers = config.tariff.fetch_tiers().unwrap();
        assert_eq!(tiers.len(), 2);
    }

    #[test]
    fn tariff_file_shape_parses() {
        let json = r#"{
            "tariff_id": "residential",
            "label": "Residential",
            "tiers": [
                { "lower_bound": 0, "upper_bound": 10, "rate_per_unit": "1.00" },
                { "lower_bound": 10, "upper_bound": null, "rate_per_unit": "2.00" }
            ]
        }"#;
        let tariff: TariffConfig = serde_json::from_str(json).unwrap();
        assert_eq!(tariff.tiers[1].upper_bound, None);
        assert_eq!(tariff.tiers[0].rate_per_unit, Decimal::new(1, 0));
    }

    #[test]
    fn load_reads_the_shipped_data_dir() {
        let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let config = AppConfig::load(data_dir).unwrap();
        assert!(!config.tariff.tiers.is_empty());
        assert_eq!(config.settings.recent_activity_limit, 5);
    }
}
