use super::schema::Config;
use tracing::debug;

macro_rules! define_overrides {
    ($( $env:literal => $apply:expr );* $(;)?) => {
        /// Environment variables that override config values.
        pub const OVERRIDE_ENV_VARS: &[&str] = &[$($env),*];

        /// Apply environment variable overrides.
        ///
        /// Any `SDRLINK_*` env var that is set and non-empty overwrites the
        /// corresponding config field, so tokens can be injected without
        /// touching the config file (useful for containers and CI).
        pub fn apply_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env)
                    && !val.is_empty()
                {
                    debug!("applying {} override", $env);
                    let apply: fn(&mut Config, String) = $apply;
                    apply(config, val);
                }
            )*
        }
    };
}

define_overrides! {
    "SDRLINK_API_URL"   => |c, v| c.api.base_url = v;
    "SDRLINK_TOKEN"     => |c, v| c.api.token = v;
    "SDRLINK_AGENCY_ID" => |c, v| c.api.agency_id = Some(v);
}

/// Whether `env` is set to a non-empty value (for status output).
pub fn detect_override(env: &str) -> bool {
    std::env::var(env).is_ok_and(|v| !v.is_empty())
}
