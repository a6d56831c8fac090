use std::{env, net::IpAddr, str::FromStr, time::Duration};

use farm_payment_engine::{db_url, helpers::DEFAULT_ORDER_NUMBER_PREFIX, LookupRetry, ReconciliationSettings};
use fpg_common::{parse_boolean_flag, Secret};
use log::*;

use crate::{
    integrations::relay::DEFAULT_RELAY_TIMEOUT,
    signature::{WebhookVerifier, DEFAULT_SIGNATURE_HEADER, DEFAULT_SIGNATURE_TOLERANCE},
};

const DEFAULT_FPG_HOST: &str = "127.0.0.1";
const DEFAULT_FPG_PORT: u16 = 8380;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub webhook: WebhookConfig,
    pub relay: RelayConfig,
    pub reconciliation: ReconciliationSettings,
    /// How often to retry matching payments that arrived before their order. `None` disables the sweeper.
    pub sweep_interval: Option<Duration>,
    /// If supplied, requests against /webhook endpoints will be checked against a whitelist of processor IP
    /// addresses.
    pub processor_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub signing_secret: Secret<String>,
    pub signature_header: String,
    pub tolerance: Duration,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub url: Option<String>,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FPG_HOST.to_string(),
            port: DEFAULT_FPG_PORT,
            database_url: String::default(),
            webhook: WebhookConfig::default(),
            relay: RelayConfig::default(),
            reconciliation: ReconciliationSettings::default(),
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            processor_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: Secret::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { url: None, timeout: DEFAULT_RELAY_TIMEOUT }
    }
}

impl WebhookConfig {
    pub fn verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(self.signing_secret.clone())
            .with_header_name(self.signature_header.as_str())
            .with_tolerance(self.tolerance)
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FPG_HOST").ok().unwrap_or_else(|| DEFAULT_FPG_HOST.into());
        let port = parse_env("FPG_PORT", DEFAULT_FPG_PORT);
        let database_url = db_url();
        let webhook = WebhookConfig::from_env_or_default();
        let relay = RelayConfig::from_env_or_default();
        let reconciliation = reconciliation_settings_from_env();
        let sweep_interval = match parse_env("FPG_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL.as_secs()) {
            0 => {
                info!("🪛️ The unmatched payment sweeper is disabled.");
                None
            },
            secs => Some(Duration::from_secs(secs)),
        };
        let processor_whitelist = env::var("FPG_PROCESSOR_IP_WHITELIST").ok().and_then(|s| parse_ip_whitelist(&s));
        log_whitelist(&processor_whitelist);
        let use_x_forwarded_for = parse_boolean_flag(env::var("FPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("FPG_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            webhook,
            relay,
            reconciliation,
            sweep_interval,
            processor_whitelist,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let signing_secret = env::var("FPG_WEBHOOK_SIGNING_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FPG_WEBHOOK_SIGNING_SECRET is not set. Every webhook will be refused until it is set to the signing \
                 secret of your webhook endpoint."
            );
            String::default()
        });
        let signature_header =
            env::var("FPG_SIGNATURE_HEADER").ok().unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());
        let tolerance =
            Duration::from_secs(parse_env("FPG_SIGNATURE_TOLERANCE_SECS", DEFAULT_SIGNATURE_TOLERANCE.as_secs()));
        Self { signing_secret: Secret::new(signing_secret), signature_header, tolerance }
    }
}

impl RelayConfig {
    pub fn from_env_or_default() -> Self {
        let url = env::var("FPG_RELAY_URL").ok().filter(|s| !s.trim().is_empty());
        if url.is_none() {
            info!("🪛️ FPG_RELAY_URL is not set. Paid orders will not be relayed.");
        }
        let timeout = Duration::from_secs(parse_env("FPG_RELAY_TIMEOUT_SECS", DEFAULT_RELAY_TIMEOUT.as_secs()));
        Self { url, timeout }
    }
}

fn reconciliation_settings_from_env() -> ReconciliationSettings {
    let defaults = LookupRetry::default();
    let attempts = parse_env("FPG_ORDER_LOOKUP_ATTEMPTS", defaults.attempts);
    let delay = parse_env("FPG_ORDER_LOOKUP_DELAY_MS", defaults.delay.as_millis() as u64);
    let prefix = env::var("FPG_ORDER_NUMBER_PREFIX").ok().unwrap_or_else(|| DEFAULT_ORDER_NUMBER_PREFIX.to_string());
    ReconciliationSettings::default()
        .with_lookup_retry(LookupRetry::new(attempts, Duration::from_millis(delay)))
        .with_order_number_prefix(prefix)
}

/// Reads `name` from the environment, falling back to `default` (with a log entry) when it is missing or invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

/// Parses a comma-separated list of IP addresses. "none", "false" and "0" explicitly disable the whitelist.
pub fn parse_ip_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
        return None;
    }
    let ip_addrs = s
        .split(',')
        .filter_map(|s| {
            s.trim()
                .parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in FPG_PROCESSOR_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn log_whitelist(whitelist: &Option<Vec<IpAddr>>) {
    match whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The processor IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 webhook deliveries."
            );
        },
        None => {
            info!("🪛️ No processor IP whitelist is set. Only signature validation will be used.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Processor IP whitelist: {addrs}");
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whitelist_parsing() {
        assert_eq!(parse_ip_whitelist("none"), None);
        assert_eq!(parse_ip_whitelist(" FALSE "), None);
        assert_eq!(parse_ip_whitelist("0"), None);
        let list = parse_ip_whitelist("3.18.12.63, 13.235.14.237,not-an-ip,::1").unwrap();
        let expected: Vec<IpAddr> =
            vec!["3.18.12.63".parse().unwrap(), "13.235.14.237".parse().unwrap(), "::1".parse().unwrap()];
        assert_eq!(list, expected);
        assert_eq!(parse_ip_whitelist("junk"), Some(vec![]));
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.port, 9000);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.webhook.signature_header, "Stripe-Signature");
        assert_eq!(config.webhook.tolerance, Duration::from_secs(300));
        assert_eq!(config.relay.timeout, Duration::from_secs(7));
        assert!(config.relay.url.is_none());
        assert_eq!(config.reconciliation.order_number_prefix, "FM");
        assert_eq!(config.reconciliation.lookup_retry.attempts, 3);
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(parse_env("FPG_TEST_SURELY_UNSET_VARIABLE", 42u16), 42);
    }
}
