use serde::{Deserialize, Serialize};

/// Request metadata recorded alongside audited actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    /// Client network address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session identifier issued by the gateway.
    pub session_id: Option<String>,
    /// Correlation identifier shared by events of one request.
    pub correlation_id: Option<String>,
}

/// Actor identity attached to every administrative call and audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    display_name: String,
    email: Option<String>,
    #[serde(default)]
    origin: RequestOrigin,
}

impl UserIdentity {
    /// Creates a user identity from authentication data.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            email,
            origin: RequestOrigin::default(),
        }
    }

    /// Attaches the request metadata this identity acted through.
    #[must_use]
    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Identity used for actions the platform performs on its own behalf.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system", "System", None)
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the request metadata this identity acted through.
    #[must_use]
    pub fn origin(&self) -> &RequestOrigin {
        &self.origin
    }
}
