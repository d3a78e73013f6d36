use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// Reads `ENVIRONMENT`; anything other than `production`/`prod` is development.
    pub fn from_env() -> Self {
        Self::parse(&env::var("ENVIRONMENT").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Reads a boolean-like environment variable.
///
/// `1`, `true`, `yes` and `on` (any case) enable the flag. Unset, empty or any
/// other value leaves it disabled.
pub fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| parse_flag(&v)).unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn test_parse_flag_values() {
        for truthy in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(parse_flag(truthy), "{truthy:?} should enable the flag");
        }
        for falsy in ["", "0", "false", "no", "off", "enabled"] {
            assert!(!parse_flag(falsy), "{falsy:?} should not enable the flag");
        }
    }

    #[test]
    #[serial]
    fn test_env_flag_reads_variable() {
        let name = "COMMON_TEST_FLAG";

        unsafe { env::remove_var(name) };
        assert!(!env_flag(name), "Unset flag should be disabled");

        unsafe { env::set_var(name, "true") };
        assert!(env_flag(name));

        unsafe { env::set_var(name, "false") };
        assert!(!env_flag(name));

        unsafe { env::remove_var(name) };
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        unsafe { env::set_var("ENVIRONMENT", "production") };
        assert_eq!(Environment::from_env(), Environment::Production);

        unsafe { env::remove_var("ENVIRONMENT") };
        assert_eq!(Environment::from_env(), Environment::Development);
    }
}
