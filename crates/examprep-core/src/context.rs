//! The logged-in learner, as an explicit value.
//!
//! The product keeps a single JSON blob for the signed-in user. Here it is
//! parsed once into a [`LearnerContext`] that the caller owns and passes to
//! whatever needs it. Reading and writing the blob to device storage is
//! someone else's job.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ParseError;

/// Bearer token for the backend. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// The learner's current plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub plan_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// A plan without an expiry never lapses.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// The signed-in learner.
#[derive(Debug, Clone)]
pub struct LearnerContext {
    learner_id: String,
    display_name: String,
    phone: Option<String>,
    token: AuthToken,
    subscription: Option<Subscription>,
}

#[derive(Deserialize)]
struct RawLearner {
    #[serde(alias = "_id", alias = "userId", alias = "user_id")]
    id: Option<String>,
    #[serde(alias = "fullName", alias = "full_name")]
    name: Option<String>,
    #[serde(alias = "mobile", alias = "phoneNumber")]
    phone: Option<String>,
    #[serde(alias = "authToken", alias = "auth_token", alias = "accessToken")]
    token: Option<String>,
    subscription: Option<RawSubscription>,
}

#[derive(Deserialize)]
struct RawSubscription {
    #[serde(alias = "planId", alias = "plan")]
    plan_id: Option<String>,
    #[serde(alias = "expiresAt", alias = "validTill")]
    expires_at: Option<DateTime<Utc>>,
}

impl LearnerContext {
    pub fn new(learner_id: impl Into<String>, display_name: impl Into<String>, token: AuthToken) -> Self {
        Self {
            learner_id: learner_id.into(),
            display_name: display_name.into(),
            phone: None,
            token,
            subscription: None,
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Parse the stored session blob.
    pub fn from_json(content: &str) -> Result<Self, ParseError> {
        let raw: RawLearner = serde_json::from_str(content).map_err(|e| ParseError::Json {
            source_name: "learner session".into(),
            message: e.to_string(),
        })?;

        let learner_id = raw.id.ok_or_else(|| ParseError::MissingField {
            context: "learner".into(),
            field: "id",
        })?;
        let token = raw.token.ok_or_else(|| ParseError::MissingField {
            context: format!("learner {learner_id}"),
            field: "token",
        })?;

        let subscription = raw
            .subscription
            .map(|s| {
                let plan_id = s.plan_id.ok_or_else(|| ParseError::MissingField {
                    context: format!("learner {learner_id} subscription"),
                    field: "plan_id",
                })?;
                Ok(Subscription {
                    plan_id,
                    expires_at: s.expires_at,
                })
            })
            .transpose()?;

        Ok(Self {
            display_name: raw.name.unwrap_or_default(),
            learner_id,
            phone: raw.phone,
            token: AuthToken(token),
            subscription,
        })
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn auth_token(&self) -> &AuthToken {
        &self.token
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.is_active_at(now))
    }
}
