//! Plugin configuration, loaded from `config.toml` in the data folder.

use claims_engine::{ClaimRules, DustEffect, NationRules, Rgb, WarRules};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LandClaimsConfig {
    pub database: DatabaseConfig,
    pub claims: ClaimsConfig,
    pub nations: NationsConfig,
    pub wars: WarsConfig,
    pub border: BorderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    claims_db::DEFAULT_URL.to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimsConfig {
    pub starting_chunks_per_claim: u32,
    pub max_claims_per_player: u32,
    pub require_adjacent: bool,
    pub max_name_len: usize,
    #[serde(default = "yes")]
    pub wilderness_pvp: bool,
}

const fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NationsConfig {
    pub max_members: usize,
    pub max_name_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarsConfig {
    pub preparation_secs: u64,
    pub ceasefire_secs: u64,
    pub max_duration_secs: u64,
    pub shield_secs: u64,
    pub tick_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BorderConfig {
    pub duration_secs: u64,
    pub spacing: f64,
    pub from: String,
    pub to: String,
    pub period_ticks: u32,
    pub size: f32,
    #[serde(default)]
    pub rainbow: bool,
}

impl BorderConfig {
    /// Colors that fail to parse fall back to white.
    #[must_use]
    pub fn effect(&self) -> DustEffect {
        let white = Rgb::new(255, 255, 255);
        DustEffect {
            from: Rgb::from_hex(&self.from).unwrap_or(white),
            to: Rgb::from_hex(&self.to).unwrap_or(white),
            period_ticks: self.period_ticks,
            size: self.size,
        }
    }
}

impl LandClaimsConfig {
    /// Load config from a TOML file, writing the bundled default first if
    /// the file is missing.
    pub fn load(path: &std::path::Path) -> Result<Self, String> {
        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| format!("read config: {e}"))?;
            Self::parse(&text)
        } else {
            let default_toml = include_str!("../config.toml");
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| format!("create config dir: {e}"))?;
            }
            std::fs::write(path, default_toml).map_err(|e| format!("write default config: {e}"))?;
            log::info!("landclaims: Created default config at {path:?}");
            Self::parse(default_toml)
        }
    }

    pub(crate) fn parse(text: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| format!("parse config: {e}"))?;
        if config.claims.max_claims_per_player == 0 {
            return Err("parse config: claims.max_claims_per_player must be at least 1".into());
        }
        if config.wars.tick_secs == 0 {
            return Err("parse config: wars.tick_secs must be at least 1".into());
        }
        Ok(config)
    }

    #[must_use]
    pub const fn claim_rules(&self) -> ClaimRules {
        ClaimRules {
            starting_chunks_per_claim: self.claims.starting_chunks_per_claim,
            max_claims_per_player: self.claims.max_claims_per_player,
            require_adjacent: self.claims.require_adjacent,
            max_name_len: self.claims.max_name_len,
        }
    }

    #[must_use]
    pub const fn nation_rules(&self) -> NationRules {
        NationRules {
            max_members: self.nations.max_members,
            max_name_len: self.nations.max_name_len,
        }
    }

    #[must_use]
    pub const fn war_rules(&self) -> WarRules {
        WarRules {
            preparation_secs: self.wars.preparation_secs,
            ceasefire_secs: self.wars.ceasefire_secs,
            max_duration_secs: self.wars.max_duration_secs,
            shield_secs: self.wars.shield_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_parses() {
        let config = LandClaimsConfig::parse(include_str!("../config.toml")).unwrap();
        assert_eq!(config.claim_rules(), ClaimRules::default());
        assert_eq!(config.war_rules(), WarRules::default());
        assert_eq!(config.nation_rules(), NationRules::default());
        assert_eq!(config.border.effect().from, Rgb::new(0xff, 0x55, 0x55));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let text = include_str!("../config.toml").replace("tick_secs = 30", "tick_secs = 0");
        assert!(LandClaimsConfig::parse(&text).is_err());
    }
}
