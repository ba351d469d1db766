//! User, company and role types.

use serde::{Deserialize, Serialize};

/// Role of a user within their company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Company owner
    Owner,
    /// Company administrator
    Admin,
    /// Trading user
    Trader,
    /// Follower; does not trade and is left out of rollups
    Member,
}

impl Role {
    /// Whether trades by this role count toward company stats and rankings.
    pub fn is_ranked(&self) -> bool {
        !matches!(self, Role::Member)
    }

    /// Whether this role may act on other users' trades in the same company.
    pub fn is_company_manager(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Admin => write!(f, "admin"),
            Role::Trader => write!(f, "trader"),
            Role::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "trader" => Ok(Role::Trader),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Opt-in to public rankings
    pub show_on_leaderboard: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Profile {
    /// Create a new profile, opted out of the leaderboard.
    pub fn new(user_id: String, username: String, role: Role) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            user_id,
            company_id: None,
            display_name: username.clone(),
            username,
            role,
            show_on_leaderboard: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A company (tenant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

impl Company {
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Authenticated caller identity, resolved outside the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    pub company_id: Option<String>,
    pub role: Role,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, company_id: Option<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            company_id,
            role,
        }
    }
}

/// Request to create or update a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProfileRequest {
    pub user_id: String,
    #[serde(default)]
    pub company_id: Option<String>,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub show_on_leaderboard: bool,
}

/// Request to create a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest {
    pub name: String,
}
