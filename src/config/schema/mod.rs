use serde::{Deserialize, Serialize};

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name` : printed normally via `&self.field_name`
/// - `redact(field_name)` : `String` field: shows `[empty]` or `[REDACTED]`
/// - `redact_option(field_name)` : `Option<String>` field: shows `None` or `Some("[REDACTED]")`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(
            stringify!($field),
            &$self.$field.as_ref().map(|_| "[REDACTED]"),
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact_option($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Submodules are declared after the macro so they can use `redact_debug!`
mod api;
mod pairing;

pub use api::*;
pub use pairing::*;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), crate::errors::PairingError> {
        self.validate_api()?;
        self.validate_pairing()?;
        Ok(())
    }

    fn validate_api(&self) -> Result<(), crate::errors::PairingError> {
        use crate::errors::PairingError;
        let a = &self.api;

        let parsed = url::Url::parse(&a.base_url).map_err(|e| {
            PairingError::Config(format!("api.baseUrl is not a valid URL ({}): {}", a.base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PairingError::Config(format!(
                "api.baseUrl must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if a.timeout_secs == 0 {
            return Err(PairingError::Config("api.timeoutSecs must be > 0".into()));
        }
        if a.connect_timeout_secs == 0 {
            return Err(PairingError::Config(
                "api.connectTimeoutSecs must be > 0".into(),
            ));
        }
        if a.connect_timeout_secs > a.timeout_secs {
            return Err(PairingError::Config(
                "api.connectTimeoutSecs must not exceed api.timeoutSecs".into(),
            ));
        }
        if let Some(agency) = &a.agency_id
            && agency.trim().is_empty()
        {
            return Err(PairingError::Config(
                "api.agencyId must not be blank when set".into(),
            ));
        }
        Ok(())
    }

    fn validate_pairing(&self) -> Result<(), crate::errors::PairingError> {
        use crate::errors::PairingError;
        let p = &self.pairing;

        if p.poll_interval_secs == 0 {
            return Err(PairingError::Config(
                "pairing.pollIntervalSecs must be > 0".into(),
            ));
        }
        if p.poll_interval_secs > 60 {
            return Err(PairingError::Config(
                "pairing.pollIntervalSecs is unreasonably large (> 60)".into(),
            ));
        }
        if p.qr_ttl_secs == 0 {
            return Err(PairingError::Config("pairing.qrTtlSecs must be > 0".into()));
        }
        if p.max_poll_failures == 0 {
            return Err(PairingError::Config(
                "pairing.maxPollFailures must be > 0".into(),
            ));
        }
        if p.backoff_max_secs < p.poll_interval_secs {
            return Err(PairingError::Config(
                "pairing.backoffMaxSecs must be >= pairing.pollIntervalSecs".into(),
            ));
        }
        if let Some(name) = &p.instance_name
            && (name.trim().is_empty() || name.chars().any(char::is_whitespace))
        {
            return Err(PairingError::Config(
                "pairing.instanceName must be non-empty and contain no whitespace".into(),
            ));
        }
        Ok(())
    }
}
