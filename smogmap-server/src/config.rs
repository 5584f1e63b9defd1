//! Command line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use smogmap_provider_airly::AirlyConfig;
use smogmap_provider_gios::GiosConfig;
use smogmap_provider_looko2::Looko2Config;
use smogmap_provider_pwr::PwrConfig;

/// Server settings, read from flags with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "smogmap-server", version, about = "Aggregated PM2.5 readings around a point")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "SMOGMAP_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Query radius in meters.
    #[arg(long, env = "SMOGMAP_RADIUS", default_value_t = 5_000.0)]
    pub radius: f64,

    /// Timeout for each upstream HTTP request, in seconds.
    #[arg(long, env = "SMOGMAP_REQUEST_TIMEOUT_SECS", default_value_t = 5)]
    pub request_timeout_secs: u64,

    /// Time a provider may take in total before it is dropped, in seconds.
    #[arg(long, env = "SMOGMAP_PROVIDER_DEADLINE_SECS", default_value_t = 15)]
    pub provider_deadline_secs: u64,

    /// Origin allowed to call the API from a browser.
    #[arg(long, env = "SMOGMAP_CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Airly API key.
    #[arg(long, env = "AIRLY_API_KEY", default_value = "", hide_env_values = true)]
    pub airly_api_key: String,

    /// Airly API root.
    #[arg(long, env = "AIRLY_BASE_URL", default_value = smogmap_provider_airly::BASE_URL)]
    pub airly_base_url: String,

    /// GIOŚ API root.
    #[arg(long, env = "GIOS_BASE_URL", default_value = smogmap_provider_gios::BASE_URL)]
    pub gios_base_url: String,

    /// `LookO2` site root.
    #[arg(long, env = "LOOKO2_BASE_URL", default_value = smogmap_provider_looko2::BASE_URL)]
    pub looko2_base_url: String,

    /// Accept the broken `LookO2` certificate chain.
    #[arg(
        long,
        env = "LOOKO2_ACCEPT_INVALID_CERTS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub looko2_accept_invalid_certs: bool,

    /// PWr map page.
    #[arg(long, env = "PWR_PAGE_URL", default_value = smogmap_provider_pwr::PAGE_URL)]
    pub pwr_page_url: String,
}

impl Config {
    /// Per-request upstream timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Per-provider deadline.
    #[must_use]
    pub fn provider_deadline(&self) -> Duration {
        Duration::from_secs(self.provider_deadline_secs)
    }

    /// Airly provider settings.
    #[must_use]
    pub fn airly(&self) -> AirlyConfig {
        AirlyConfig {
            base_url: self.airly_base_url.clone(),
            api_key: self.airly_api_key.clone(),
        }
    }

    /// GIOŚ provider settings.
    #[must_use]
    pub fn gios(&self) -> GiosConfig {
        GiosConfig {
            base_url: self.gios_base_url.clone(),
        }
    }

    /// `LookO2` provider settings.
    #[must_use]
    pub fn looko2(&self) -> Looko2Config {
        Looko2Config {
            base_url: self.looko2_base_url.clone(),
        }
    }

    /// PWr provider settings.
    #[must_use]
    pub fn pwr(&self) -> PwrConfig {
        PwrConfig {
            page_url: self.pwr_page_url.clone(),
        }
    }
}
