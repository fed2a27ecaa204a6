use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Longest loan term accepted at intake (40 years).
pub const MAX_TERM_MONTHS: u32 = 480;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier wrapper for recorded decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(pub Uuid);

/// Stable identifier of an authenticated caller, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Applicant,
    Officer,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Applicant => "APPLICANT",
            Role::Officer => "OFFICER",
        }
    }
}

/// The already-authenticated actor behind a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
    pub national_id: Option<String>,
}

impl Principal {
    pub fn applicant(id: impl Into<String>) -> Self {
        Self {
            id: PrincipalId(id.into()),
            role: Role::Applicant,
            national_id: None,
        }
    }

    pub fn officer(id: impl Into<String>) -> Self {
        Self {
            id: PrincipalId(id.into()),
            role: Role::Officer,
            national_id: None,
        }
    }

    pub fn with_national_id(mut self, national_id: impl Into<String>) -> Self {
        self.national_id = Some(national_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub const fn is_decided(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

impl DecisionOutcome {
    /// Terminal status an application lands in once this outcome is recorded.
    pub const fn resulting_status(self) -> ApplicationStatus {
        match self {
            DecisionOutcome::Approved => ApplicationStatus::Approved,
            DecisionOutcome::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// A mortgage loan application as held by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub owner_id: PrincipalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_national_id: Option<String>,
    pub status: ApplicationStatus,
    pub amount: u64,
    pub term_months: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        self.owner_id == principal.id
    }
}

/// Officer verdict on an application. One per application, ever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: DecisionId,
    pub application_id: ApplicationId,
    pub officer_id: PrincipalId,
    pub outcome: DecisionOutcome,
    pub comments: String,
    pub decided_at: DateTime<Utc>,
}

/// Applicant-supplied loan terms for create and update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    #[serde(deserialize_with = "whole_amount")]
    pub amount: u64,
    pub term_months: u32,
}

impl ApplicationRequest {
    pub fn validate(&self) -> Result<(), FieldViolation> {
        if self.amount == 0 {
            return Err(FieldViolation::new("amount", "must be greater than zero"));
        }
        if self.term_months == 0 || self.term_months > MAX_TERM_MONTHS {
            return Err(FieldViolation::new(
                "termMonths",
                format!("must be between 1 and {MAX_TERM_MONTHS}"),
            ));
        }
        Ok(())
    }
}

/// Amounts are whole currency units; fractions and negatives are refused by name.
fn whole_amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct WholeAmount;

    impl<'de> de::Visitor<'de> for WholeAmount {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("amount as a whole number of currency units")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }
    }

    deserializer.deserialize_u64(WholeAmount)
}

/// Longest comment an officer may attach to a decision.
pub const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub outcome: DecisionOutcome,
    #[serde(default)]
    pub comments: String,
}

impl DecisionRequest {
    pub fn new(outcome: DecisionOutcome, comments: impl Into<String>) -> Self {
        Self {
            outcome,
            comments: comments.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FieldViolation> {
        if self.comments.chars().count() > MAX_COMMENT_CHARS {
            return Err(FieldViolation::new(
                "comments",
                format!("must be at most {MAX_COMMENT_CHARS} characters"),
            ));
        }
        Ok(())
    }
}

/// Field-level validation message surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Officer-side listing filter. Every present field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_to: Option<DateTime<Utc>>,
    #[serde(alias = "ownerNationalId")]
    pub national_id: Option<String>,
}

impl ApplicationFilter {
    pub fn with_status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Both creation bounds are exclusive.
    pub fn matches(&self, application: &Application) -> bool {
        self.status
            .map_or(true, |status| application.status == status)
            && self
                .created_from
                .map_or(true, |from| application.created_at > from)
            && self
                .created_to
                .map_or(true, |to| application.created_at < to)
            && self.national_id.as_deref().map_or(true, |national_id| {
                application.owner_national_id.as_deref() == Some(national_id)
            })
    }
}

/// Accepts RFC 3339 with an offset, or an offset-less ISO date-time read as UTC.
fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(raw.trim()).map(Some).ok_or_else(|| {
        de::Error::custom(format!("{raw:?} is not an ISO-8601 date-time"))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamped) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamped.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|naive| naive.and_utc())
}
