use serde::Deserialize;
use std::env;

use crate::models::OperationKind;
use crate::services::error::ScaError;

#[derive(Debug, Clone, Deserialize)]
pub struct ScaConfig {
    pub policy: PolicySet,
    pub smtp: SmtpConfig,
    pub sms: SmsGatewayConfig,
    pub push: FcmConfig,
}

/// Challenge policy for one operation kind. All knobs are configuration
/// inputs, consulted once per operation kind.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengePolicy {
    pub code_length: usize,
    pub code_ttl_secs: i64,
    pub max_attempts: i32,
    pub max_resends: i32,
    /// Global window for the whole operation across all approvers.
    pub operation_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySet {
    pub payment: ChallengePolicy,
    pub payment_cancellation: ChallengePolicy,
    pub user_data_change: ChallengePolicy,
    pub consent: ChallengePolicy,
}

impl PolicySet {
    pub fn for_kind(&self, kind: OperationKind) -> &ChallengePolicy {
        match kind {
            OperationKind::Payment => &self.payment,
            OperationKind::PaymentCancellation => &self.payment_cancellation,
            OperationKind::UserDataChange => &self.user_data_change,
            OperationKind::Consent => &self.consent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsGatewayConfig {
    pub api_url: String,
    pub auth_key: String,
    pub sender_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    pub project_id: String,
    pub service_account_key: String,
    pub enabled: bool,
}

impl ScaConfig {
    pub fn load() -> Result<Self, ScaError> {
        dotenvy::dotenv().ok();
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ScaConfig {
            policy: PolicySet {
                // Payment codes get a shorter window than data-change codes.
                payment: load_policy("SCA_PAYMENT", PolicyDefaults::payment(), is_prod)?,
                payment_cancellation: load_policy(
                    "SCA_CANCELLATION",
                    PolicyDefaults::payment(),
                    is_prod,
                )?,
                user_data_change: load_policy(
                    "SCA_DATA_CHANGE",
                    PolicyDefaults::data_change(),
                    is_prod,
                )?,
                consent: load_policy("SCA_CONSENT", PolicyDefaults::consent(), is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@example.com"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Authorization Service"), is_prod)?,
                enabled: env::var("SMTP_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            sms: SmsGatewayConfig {
                api_url: get_env("SMS_GATEWAY_URL", Some(""), is_prod)?,
                auth_key: get_env("SMS_GATEWAY_AUTH_KEY", Some(""), is_prod)?,
                sender_id: get_env("SMS_GATEWAY_SENDER_ID", Some(""), is_prod)?,
                enabled: env::var("SMS_GATEWAY_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            push: FcmConfig {
                project_id: get_env("FCM_PROJECT_ID", Some(""), is_prod)?,
                service_account_key: get_env("FCM_SERVICE_ACCOUNT_KEY", Some(""), is_prod)?,
                enabled: env::var("FCM_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
        })
    }
}

struct PolicyDefaults {
    code_length: &'static str,
    code_ttl_secs: &'static str,
    max_attempts: &'static str,
    max_resends: &'static str,
    operation_ttl_secs: &'static str,
}

impl PolicyDefaults {
    fn payment() -> Self {
        Self {
            code_length: "6",
            code_ttl_secs: "300",
            max_attempts: "3",
            max_resends: "3",
            operation_ttl_secs: "3600",
        }
    }

    fn data_change() -> Self {
        Self {
            code_length: "6",
            code_ttl_secs: "600",
            max_attempts: "3",
            max_resends: "3",
            operation_ttl_secs: "7200",
        }
    }

    fn consent() -> Self {
        Self {
            code_length: "6",
            code_ttl_secs: "600",
            max_attempts: "3",
            max_resends: "3",
            operation_ttl_secs: "86400",
        }
    }
}

fn load_policy(
    prefix: &str,
    defaults: PolicyDefaults,
    is_prod: bool,
) -> Result<ChallengePolicy, ScaError> {
    let parse_i64 = |key: &str, default: &'static str| -> Result<i64, ScaError> {
        let raw = get_env(&format!("{}_{}", prefix, key), Some(default), is_prod)?;
        raw.parse().map_err(|_| {
            ScaError::Config(anyhow::anyhow!(
                "{}_{} must be an integer, got {}",
                prefix,
                key,
                raw
            ))
        })
    };

    Ok(ChallengePolicy {
        code_length: parse_i64("CODE_LENGTH", defaults.code_length)? as usize,
        code_ttl_secs: parse_i64("CODE_TTL_SECS", defaults.code_ttl_secs)?,
        max_attempts: parse_i64("MAX_ATTEMPTS", defaults.max_attempts)? as i32,
        max_resends: parse_i64("MAX_RESENDS", defaults.max_resends)? as i32,
        operation_ttl_secs: parse_i64("OPERATION_TTL_SECS", defaults.operation_ttl_secs)?,
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, ScaError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(ScaError::Config(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(ScaError::Config(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
