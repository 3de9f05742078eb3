use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Cookie name Knox uses for its SSO JWT.
pub const KNOX_JWT_COOKIE: &str = "hadoop-jwt";

/// A credential the gateway accepts. Exactly one form is active per session.
#[derive(Clone, PartialEq, Eq)]
pub enum GatewayCredential {
    BearerToken(String),
    SessionCookie(String),
    BasicAuth {
        user: String,
        password: String,
    },
    TokenExchange {
        token_endpoint: String,
        passcode_token: String,
    },
}

impl GatewayCredential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            GatewayCredential::BearerToken(_) => CredentialKind::Token,
            GatewayCredential::SessionCookie(_) => CredentialKind::Cookie,
            GatewayCredential::BasicAuth { .. } => CredentialKind::Basic,
            GatewayCredential::TokenExchange { .. } => CredentialKind::TokenExchange,
        }
    }
}

impl fmt::Debug for GatewayCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCredential::BearerToken(_) => f.write_str("BearerToken(***)"),
            GatewayCredential::SessionCookie(_) => f.write_str("SessionCookie(***)"),
            GatewayCredential::BasicAuth { user, .. } => f
                .debug_struct("BasicAuth")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            GatewayCredential::TokenExchange { token_endpoint, .. } => f
                .debug_struct("TokenExchange")
                .field("token_endpoint", token_endpoint)
                .field("passcode_token", &"***")
                .finish(),
        }
    }
}

/// Credential forms, declared in selection precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    Token,
    Cookie,
    TokenExchange,
    Basic,
}

impl CredentialKind {
    pub const PRECEDENCE: [CredentialKind; 4] = [
        CredentialKind::Token,
        CredentialKind::Cookie,
        CredentialKind::TokenExchange,
        CredentialKind::Basic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKind::Token => "token",
            CredentialKind::Cookie => "cookie",
            CredentialKind::TokenExchange => "token-exchange",
            CredentialKind::Basic => "basic",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which credential form to use. `Auto` infers it from the populated fields
/// and refuses to guess when more than one is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    #[default]
    Auto,
    Token,
    Cookie,
    Basic,
    TokenExchange,
}

impl AuthMode {
    fn forced_kind(self) -> Option<CredentialKind> {
        match self {
            AuthMode::Auto => None,
            AuthMode::Token => Some(CredentialKind::Token),
            AuthMode::Cookie => Some(CredentialKind::Cookie),
            AuthMode::Basic => Some(CredentialKind::Basic),
            AuthMode::TokenExchange => Some(CredentialKind::TokenExchange),
        }
    }
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "auto" => Ok(AuthMode::Auto),
            "token" | "bearer" | "jwt" => Ok(AuthMode::Token),
            "cookie" => Ok(AuthMode::Cookie),
            "basic" | "password" => Ok(AuthMode::Basic),
            "token-exchange" | "passcode" => Ok(AuthMode::TokenExchange),
            _ => Err(ConfigError::UnknownAuthMode(raw.to_string())),
        }
    }
}

/// Raw credential fields as read from flags or the environment. Any of them
/// may be missing or blank.
#[derive(Clone, Default)]
pub struct CredentialSources {
    pub token: Option<String>,
    pub cookie: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub token_endpoint: Option<String>,
    pub passcode_token: Option<String>,
}

impl fmt::Debug for CredentialSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSources")
            .field("populated", &self.populated())
            .finish()
    }
}

impl CredentialSources {
    /// Credential forms with at least one non-blank field, in precedence order.
    pub fn populated(&self) -> Vec<CredentialKind> {
        CredentialKind::PRECEDENCE
            .into_iter()
            .filter(|kind| self.is_populated(*kind))
            .collect()
    }

    /// Resolve the single credential to use.
    ///
    /// With [`AuthMode::Auto`] the populated fields are walked in
    /// [`CredentialKind::PRECEDENCE`] order; zero or several populated forms
    /// are rejected rather than resolved by precedence. An explicit mode takes
    /// that form and ignores the rest (see [`CredentialSources::ignored`]).
    pub fn resolve(&self, mode: AuthMode) -> Result<GatewayCredential, ConfigError> {
        if let Some(kind) = mode.forced_kind() {
            return self.take(kind);
        }

        match self.populated().as_slice() {
            [] => Err(ConfigError::NoCredential),
            [kind] => self.take(*kind),
            many => Err(ConfigError::AmbiguousCredential {
                sources: many.iter().map(|kind| kind.as_str()).collect(),
            }),
        }
    }

    /// Populated forms an explicit mode will not use.
    pub fn ignored(&self, mode: AuthMode) -> Vec<CredentialKind> {
        match mode.forced_kind() {
            Some(chosen) => self
                .populated()
                .into_iter()
                .filter(|kind| *kind != chosen)
                .collect(),
            None => Vec::new(),
        }
    }

    fn is_populated(&self, kind: CredentialKind) -> bool {
        match kind {
            CredentialKind::Token => non_blank(&self.token).is_some(),
            CredentialKind::Cookie => non_blank(&self.cookie).is_some(),
            CredentialKind::TokenExchange => {
                non_blank(&self.token_endpoint).is_some()
                    || non_blank(&self.passcode_token).is_some()
            }
            CredentialKind::Basic => {
                non_blank(&self.user).is_some() || non_blank(&self.password).is_some()
            }
        }
    }

    fn take(&self, kind: CredentialKind) -> Result<GatewayCredential, ConfigError> {
        let missing = |field: &'static str| ConfigError::IncompleteCredential {
            kind: kind.as_str(),
            missing: field,
        };

        match kind {
            CredentialKind::Token => {
                let token = non_blank(&self.token).ok_or_else(|| missing("token"))?;
                Ok(GatewayCredential::BearerToken(token.to_string()))
            }
            CredentialKind::Cookie => {
                let cookie = non_blank(&self.cookie).ok_or_else(|| missing("cookie"))?;
                Ok(GatewayCredential::SessionCookie(normalize_cookie(cookie)))
            }
            CredentialKind::TokenExchange => {
                let token_endpoint =
                    non_blank(&self.token_endpoint).ok_or_else(|| missing("token_endpoint"))?;
                let passcode_token =
                    non_blank(&self.passcode_token).ok_or_else(|| missing("passcode_token"))?;
                Ok(GatewayCredential::TokenExchange {
                    token_endpoint: token_endpoint.to_string(),
                    passcode_token: passcode_token.to_string(),
                })
            }
            CredentialKind::Basic => {
                let user = non_blank(&self.user).ok_or_else(|| missing("user"))?;
                // Passwords are taken verbatim; only an empty one counts as unset.
                let password = self
                    .password
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| missing("password"))?;
                Ok(GatewayCredential::BasicAuth {
                    user: user.to_string(),
                    password: password.to_string(),
                })
            }
        }
    }
}

/// A bare value is a Knox JWT; anything with `=` is a full cookie pair.
fn normalize_cookie(raw: &str) -> String {
    if raw.contains('=') {
        raw.to_string()
    } else {
        format!("{KNOX_JWT_COOKIE}={raw}")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> CredentialSources {
        CredentialSources::default()
    }

    #[test]
    fn each_single_source_resolves_to_its_variant() {
        let token = CredentialSources {
            token: Some("jwt".into()),
            ..sources()
        };
        assert_eq!(
            token.resolve(AuthMode::Auto).unwrap(),
            GatewayCredential::BearerToken("jwt".into())
        );

        let cookie = CredentialSources {
            cookie: Some("hadoop-jwt=abc".into()),
            ..sources()
        };
        assert_eq!(
            cookie.resolve(AuthMode::Auto).unwrap(),
            GatewayCredential::SessionCookie("hadoop-jwt=abc".into())
        );

        let basic = CredentialSources {
            user: Some("ibrooks".into()),
            password: Some("secret".into()),
            ..sources()
        };
        assert_eq!(
            basic.resolve(AuthMode::Auto).unwrap(),
            GatewayCredential::BasicAuth {
                user: "ibrooks".into(),
                password: "secret".into()
            }
        );

        let exchange = CredentialSources {
            token_endpoint: Some("https://gw/knoxtoken/api/v1/token".into()),
            passcode_token: Some("pc".into()),
            ..sources()
        };
        assert_eq!(exchange.resolve(AuthMode::Auto).unwrap().kind(), CredentialKind::TokenExchange);
    }

    #[test]
    fn no_source_is_a_configuration_error() {
        let blank = CredentialSources {
            token: Some("   ".into()),
            ..sources()
        };
        assert_eq!(blank.resolve(AuthMode::Auto), Err(ConfigError::NoCredential));
        assert_eq!(sources().resolve(AuthMode::Auto), Err(ConfigError::NoCredential));
    }

    #[test]
    fn several_sources_are_rejected_in_auto_mode() {
        let both = CredentialSources {
            token: Some("jwt".into()),
            user: Some("ibrooks".into()),
            password: Some("secret".into()),
            ..sources()
        };
        assert_eq!(
            both.resolve(AuthMode::Auto),
            Err(ConfigError::AmbiguousCredential {
                sources: vec!["token", "basic"]
            })
        );
    }

    #[test]
    fn explicit_mode_picks_its_form_and_reports_the_rest() {
        let both = CredentialSources {
            token: Some("jwt".into()),
            cookie: Some("c".into()),
            ..sources()
        };
        assert_eq!(
            both.resolve(AuthMode::Token).unwrap(),
            GatewayCredential::BearerToken("jwt".into())
        );
        assert_eq!(both.ignored(AuthMode::Token), vec![CredentialKind::Cookie]);
        assert!(both.ignored(AuthMode::Auto).is_empty());
    }

    #[test]
    fn half_populated_pairs_are_incomplete() {
        let user_only = CredentialSources {
            user: Some("ibrooks".into()),
            ..sources()
        };
        assert_eq!(
            user_only.resolve(AuthMode::Auto),
            Err(ConfigError::IncompleteCredential {
                kind: "basic",
                missing: "password"
            })
        );

        let endpoint_only = CredentialSources {
            token_endpoint: Some("https://gw/token".into()),
            ..sources()
        };
        assert_eq!(
            endpoint_only.resolve(AuthMode::Auto),
            Err(ConfigError::IncompleteCredential {
                kind: "token-exchange",
                missing: "passcode_token"
            })
        );

        assert_eq!(
            sources().resolve(AuthMode::Cookie),
            Err(ConfigError::IncompleteCredential {
                kind: "cookie",
                missing: "cookie"
            })
        );
    }

    #[test]
    fn bare_cookie_value_becomes_knox_jwt_cookie() {
        let cookie = CredentialSources {
            cookie: Some("eyJhbGciOi".into()),
            ..sources()
        };
        assert_eq!(
            cookie.resolve(AuthMode::Auto).unwrap(),
            GatewayCredential::SessionCookie("hadoop-jwt=eyJhbGciOi".into())
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let credential = GatewayCredential::BasicAuth {
            user: "ibrooks".into(),
            password: "secret".into(),
        };
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("ibrooks"));
        assert!(!rendered.contains("secret"));
        assert_eq!(
            format!("{:?}", GatewayCredential::BearerToken("jwt".into())),
            "BearerToken(***)"
        );
    }

    #[test]
    fn auth_mode_parses_common_spellings() {
        assert_eq!("auto".parse::<AuthMode>().unwrap(), AuthMode::Auto);
        assert_eq!("TOKEN_EXCHANGE".parse::<AuthMode>().unwrap(), AuthMode::TokenExchange);
        assert_eq!("bearer".parse::<AuthMode>().unwrap(), AuthMode::Token);
        assert!(matches!(
            "kerberos".parse::<AuthMode>(),
            Err(ConfigError::UnknownAuthMode(_))
        ));
    }
}
