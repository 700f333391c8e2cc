use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Characters stripped from scan targets before any use.
const DISALLOWED: &[char] = &['<', '>', '"', '/', '\\', '&'];

/// Strip disallowed characters and surrounding whitespace from a target.
/// Total and idempotent: never fails, only removes.
pub fn sanitize_target(target: &str) -> String {
    target
        .chars()
        .filter(|c| !DISALLOWED.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// A scan request as received from the UI layer. Field values are unvalidated
/// strings; `orchestrator::validate` turns this into a [`ScanPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub target: String,
    pub scan_type: String,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}

impl ScanRequest {
    pub fn new(target: &str, scan_type: &str, modules: &[&str]) -> Self {
        Self {
            target: target.to_string(),
            scan_type: scan_type.to_string(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
            options: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// The closed set of scan types the platform accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    EmailLookup,
    DomainScan,
    IpLookup,
    UsernameSearch,
    PhoneLookup,
    Comprehensive,
}

impl ScanType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email_lookup" => Some(Self::EmailLookup),
            "domain_scan" => Some(Self::DomainScan),
            "ip_lookup" => Some(Self::IpLookup),
            "username_search" => Some(Self::UsernameSearch),
            "phone_lookup" => Some(Self::PhoneLookup),
            "comprehensive" => Some(Self::Comprehensive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailLookup => "email_lookup",
            Self::DomainScan => "domain_scan",
            Self::IpLookup => "ip_lookup",
            Self::UsernameSearch => "username_search",
            Self::PhoneLookup => "phone_lookup",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow-listed scan modules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScanModule {
    EmailVerification,
    BreachCheck,
    SocialProfiles,
    DnsRecords,
    Whois,
    PortScan,
    Geolocation,
    ReverseDns,
}

impl ScanModule {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email_verification" => Some(Self::EmailVerification),
            "breach_check" => Some(Self::BreachCheck),
            "social_profiles" => Some(Self::SocialProfiles),
            "dns_records" => Some(Self::DnsRecords),
            "whois" => Some(Self::Whois),
            "port_scan" => Some(Self::PortScan),
            "geolocation" => Some(Self::Geolocation),
            "reverse_dns" => Some(Self::ReverseDns),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::BreachCheck => "breach_check",
            Self::SocialProfiles => "social_profiles",
            Self::DnsRecords => "dns_records",
            Self::Whois => "whois",
            Self::PortScan => "port_scan",
            Self::Geolocation => "geolocation",
            Self::ReverseDns => "reverse_dns",
        }
    }
}

impl std::fmt::Display for ScanModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated scan request: sanitized target, typed vocabularies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPlan {
    pub target: String,
    pub scan_type: ScanType,
    pub modules: BTreeSet<ScanModule>,
    pub options: HashMap<String, serde_json::Value>,
    pub timeout_secs: u64,
    pub retries: u32,
}

impl ScanPlan {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
