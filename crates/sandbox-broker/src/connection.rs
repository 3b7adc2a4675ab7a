//! Connection descriptors handed back to callers.
//!
//! ```text
//! {scheme}://{user}:{password}@{host}:{port}/{database}[?{options}]
//! ```

use sandbox_state::SandboxInstance;

use crate::config::{Addressing, BrokerConfig, DialectConfig};

/// The host a descriptor should target, or `None` if the instance has no
/// address yet under instance addressing.
pub fn target_host(
    config: &BrokerConfig,
    dialect: &DialectConfig,
    instance: &SandboxInstance,
) -> Option<String> {
    match config.addressing {
        Addressing::Instance => instance.address.clone(),
        Addressing::Pool => Some(config.service_host(dialect)),
    }
}

/// Format the connection descriptor for `host`.
pub fn format_descriptor(dialect: &DialectConfig, host: &str) -> String {
    let mut uri = format!(
        "{}://{}:{}@{}:{}/{}",
        dialect.scheme, dialect.user, dialect.password, host, dialect.port, dialect.database
    );
    if let Some(options) = dialect.options.as_deref().filter(|o| !o.is_empty()) {
        uri.push('?');
        uri.push_str(options);
    }
    uri
}
